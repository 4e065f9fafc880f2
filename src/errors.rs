//! Error types for the crate.
//!
//! One high-level `Error` covers every failure the client surfaces: wire
//! format problems, curve decoding, sequencer transport, verification and
//! entropy failures. Errors inside parallel batches surface the first one
//! encountered; callers never observe partial results on error.
//!
//! The errors are implemented with `thiserror` so they are easy to convert
//! and debug in higher-level code.

use thiserror::Error;

/// Errors returned by the ceremony client and verifier.
#[derive(Debug, Error)]
pub enum Error {
    /// The input JSON does not match the expected document shape
    /// (missing fields, wrong lengths, bad hex prefixes).
    #[error("schema validation failed: {0}")]
    Schema(String),

    /// Well-formed JSON carrying malformed hex or an invalid curve point,
    /// including points outside the prime-order subgroup.
    #[error("decoding curve data: {0}")]
    Decode(String),

    /// An HTTP request failed or returned an unexpected status.
    #[error("sequencer transport: {0}")]
    Transport(String),

    /// The sequencer refused the contribution with a 400 response.
    /// Not retriable; the sequencer will not accept a resend.
    #[error("contribution rejected by sequencer (code: {code}): {error}")]
    ContributionRejected { code: String, error: String },

    /// A pairing or signature check over the transcript did not hold.
    #[error("transcript verification failed: {0}")]
    VerificationFailed(String),

    /// An external entropy provider could not supply randomness.
    #[error("external entropy provider: {0}")]
    Entropy(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Filesystem failure while persisting receipts or contributions.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
