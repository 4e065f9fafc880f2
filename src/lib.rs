//! # kzg-ceremony: powers-of-tau ceremony client and verifier
//!
//! A participant client and transcript verifier for the Ethereum KZG
//! trusted-setup ceremony. Each participant privately samples a secret
//! scalar, multiplicatively updates the powers-of-tau SRS of every
//! sub-ceremony, publishes the witness `[x]₂` anchoring the update, and
//! can later verify that the sequencer's published transcript is
//! internally consistent.
//!
//! ## Architecture
//!
//! - **[`curve`]**: BLS12-381 primitives over `blstrs`: scalar sampling
//!   and reduction, compressed point hex codecs with mandatory subgroup
//!   checks, pairing equality, and the self-wiping [`SecretScalar`].
//!
//! - **[`contribution`]**: the SRS data model and update engine.
//!   [`BatchContribution::contribute`] samples one secret per
//!   sub-ceremony, folds in external entropy, runs the sequential power
//!   loop and records the witness; [`BatchContribution::verify`] is the
//!   pairing self-check run before anything is transmitted. The
//!   [`contribution::json`] codec speaks the sequencer's wire format.
//!
//! - **[`transcript`]**: the published ceremony history and the
//!   verification battery (running-product updates, G1/G2 power
//!   coherence, and the EIP-712 ECDSA signature check), all dispatched on
//!   the rayon pool with first-error-wins semantics.
//!
//! - **[`sequencer`]**: typed async HTTP client for the sequencer's
//!   lobby, contribution and state endpoints.
//!
//! - **[`orchestrator`]**: the online flow: poll the lobby, contribute,
//!   submit with retries, persist the receipt and contribution.
//!
//! - **[`extrand`]**: external entropy providers (drand beacon, raw URL,
//!   caller-supplied hex).
//!
//! ## Example: offline contribution
//!
//! ```rust,no_run
//! use kzg_ceremony::contribution::json::{
//!     decode_batch_contribution, encode_batch_contribution,
//! };
//!
//! # fn main() -> kzg_ceremony::Result<()> {
//! let state = std::fs::read("current_state.json")?;
//! let mut batch = decode_batch_contribution(&state)?;
//! let previous = batch.clone();
//!
//! batch.contribute(&[])?;
//! assert!(batch.verify(&previous)?);
//!
//! std::fs::write("my_contribution.json", encode_batch_contribution(&batch, true)?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security notes
//!
//! - Every deserialized curve point passes the prime-order subgroup
//!   check; there is no unchecked decode path.
//! - Secret scalars live only inside one sub-ceremony's update frame and
//!   are wiped before the update returns, on every path.
//! - External entropy is mixed by field multiplication, so the blob
//!   order does not matter and no provider can cancel the local CSPRNG
//!   sample.

pub mod cancel;
pub mod config;
pub mod contribution;
pub mod curve;
pub mod errors;
pub mod extrand;
pub mod orchestrator;
pub mod sequencer;
pub mod transcript;

pub use cancel::CancelToken;
pub use config::ClientConfig;
pub use contribution::{BatchContribution, Contribution, PowersOfTau};
pub use curve::SecretScalar;
pub use errors::{Error, Result};
pub use orchestrator::{contribute_to_ceremony, ContributionOutcome};
pub use sequencer::{CeremonyStatus, ContributionReceipt, SequencerClient};
pub use transcript::{BatchTranscript, Transcript, Witness};
