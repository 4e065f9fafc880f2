//! Online contribution flow.
//!
//! Drives one participant through the ceremony:
//!
//! ```text
//! Lobby ──try_contribute──▶ Contributing ──update──▶ Submitting ──▶ Done
//!   ▲          │                  │                      │
//!   └──retry───┘              fatal on error         retry on transport,
//!                                                    fatal on rejection
//! ```
//!
//! Lobby polling retries transport errors and keep-waiting responses with
//! `try_delay` between attempts. A failed local update is fatal: no abort
//! call is made to the sequencer. Submission retries transport errors with
//! `send_delay`; a typed rejection is fatal because the sequencer will not
//! accept a resend. On success the receipt (as received) and the updated
//! batch (pretty-printed) are persisted next to each other.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::contribution::json::encode_batch_contribution;
use crate::contribution::BatchContribution;
use crate::errors::{Error, Result};
use crate::sequencer::{ContributionReceipt, SequencerClient};

/// Outcome of a completed online contribution.
#[derive(Debug)]
pub struct ContributionOutcome {
    pub receipt: ContributionReceipt,
    pub receipt_path: PathBuf,
    pub contribution_path: PathBuf,
}

/// Joins the lobby, waits for a slot, contributes, submits and persists.
///
/// `ext_randomness` blobs are folded into every sub-ceremony's secret.
/// `output_dir` receives `contribution_receipt_<session>.json` and
/// `my_contribution_<session>.json`.
pub async fn contribute_to_ceremony(
    client: &SequencerClient,
    config: &ClientConfig,
    session_id: &str,
    ext_randomness: &[Vec<u8>],
    output_dir: &Path,
    cancel: &CancelToken,
) -> Result<ContributionOutcome> {
    // Lobby: wait for our turn.
    let mut batch = loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        info!("waiting for our turn to contribute");
        match client.try_contribute(session_id).await {
            Ok(Some(batch)) => break batch,
            Ok(None) => {
                info!(delay = ?config.try_delay, "not our turn yet, retrying");
            }
            Err(err @ Error::Schema(_)) | Err(err @ Error::Decode(_)) => {
                // A malformed batch will not fix itself on retry.
                return Err(err);
            }
            Err(err) => {
                warn!(%err, delay = ?config.try_delay, "lobby poll failed, retrying");
            }
        }
        tokio::time::sleep(config.try_delay).await;
    };

    // Contributing: any failure here is fatal.
    info!("it's our turn, computing contribution");
    let started = std::time::Instant::now();
    batch.contribute(ext_randomness)?;
    info!(elapsed = ?started.elapsed(), "contribution ready");

    // Submitting.
    let receipt = loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        info!("sending contribution");
        match client.contribute(session_id, &batch).await {
            Ok(receipt) => break receipt,
            Err(err @ Error::ContributionRejected { .. }) => return Err(err),
            Err(err) => {
                warn!(%err, delay = ?config.send_delay, "sending contribution failed, retrying");
            }
        }
        tokio::time::sleep(config.send_delay).await;
    };

    let (receipt_path, contribution_path) =
        persist_outcome(output_dir, session_id, &receipt, &batch)?;
    info!(?receipt_path, ?contribution_path, "contribution accepted and persisted");

    Ok(ContributionOutcome {
        receipt,
        receipt_path,
        contribution_path,
    })
}

/// Writes the receipt and the updated batch to the output directory.
pub fn persist_outcome(
    output_dir: &Path,
    session_id: &str,
    receipt: &ContributionReceipt,
    batch: &BatchContribution,
) -> Result<(PathBuf, PathBuf)> {
    let receipt_path = output_dir.join(format!("contribution_receipt_{session_id}.json"));
    let receipt_json = serde_json::to_vec(receipt)
        .map_err(|e| Error::Schema(format!("encoding receipt: {e}")))?;
    std::fs::write(&receipt_path, receipt_json)?;

    let contribution_path = output_dir.join(format!("my_contribution_{session_id}.json"));
    let batch_json = encode_batch_contribution(batch, true)?;
    std::fs::write(&contribution_path, batch_json)?;

    Ok((receipt_path, contribution_path))
}
