//! Typed HTTP client for the ceremony sequencer.
//!
//! Four endpoints, all rooted at the configured base URL:
//!
//! - `GET /info/status`: lobby and contribution counters;
//! - `POST /lobby/try_contribute`: poll for a contribution slot;
//! - `POST /contribute`: submit the updated batch;
//! - `GET /info/current_state`: the full published transcript.
//!
//! The session id is an opaque bearer token supplied by the user and is
//! sent as `Authorization: Bearer <id>` where required. Requests carry no
//! implicit timeout; callers that need one wrap the futures themselves.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ClientConfig;
use crate::contribution::json::{decode_batch_contribution, encode_batch_contribution};
use crate::contribution::BatchContribution;
use crate::errors::{Error, Result};
use crate::transcript::json::decode_batch_transcript;
use crate::transcript::BatchTranscript;

/// Counters reported by `GET /info/status`.
#[derive(Clone, Debug, Deserialize)]
pub struct CeremonyStatus {
    pub lobby_size: u64,
    pub num_contributions: u64,
    pub sequencer_address: String,
}

/// Receipt pair returned after a successful contribution. Treated as an
/// opaque blob and persisted as received.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContributionReceipt {
    pub receipt: String,
    pub signature: String,
}

#[derive(Deserialize)]
struct MustWaitResponse {
    #[serde(default)]
    error: String,
}

#[derive(Default, Deserialize)]
struct RejectionResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    error: String,
}

/// Client for one sequencer deployment.
#[derive(Clone, Debug)]
pub struct SequencerClient {
    base_url: String,
    http: reqwest::Client,
}

impl SequencerClient {
    /// Creates a client for the configured sequencer.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.sequencer_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetches the sequencer status counters.
    pub async fn status(&self) -> Result<CeremonyStatus> {
        let response = self
            .http
            .get(format!("{}/info/status", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "status endpoint returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Polls the lobby for a contribution slot.
    ///
    /// Returns `Ok(None)` when the sequencer says to keep waiting and
    /// `Ok(Some(batch))` when it is our turn, with the batch already
    /// schema-validated and subgroup-checked.
    pub async fn try_contribute(&self, session_id: &str) -> Result<Option<BatchContribution>> {
        let response = self
            .http
            .post(format!("{}/lobby/try_contribute", self.base_url))
            .bearer_auth(session_id)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "try_contribute returned {}",
                response.status()
            )));
        }
        let body = response.bytes().await?;

        // A wait instruction is `{"error": "..."}`; a contribution batch
        // parses into the same shape with an empty error.
        let wait: MustWaitResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Transport(format!("unexpected try_contribute body: {e}")))?;
        if !wait.error.is_empty() {
            info!(reason = %wait.error, "sequencer asked us to keep waiting");
            return Ok(None);
        }

        Ok(Some(decode_batch_contribution(&body)?))
    }

    /// Submits the updated batch and returns the sequencer's receipt.
    ///
    /// A 400 response is a typed rejection and must not be retried; any
    /// other non-200 status is a transport error.
    pub async fn contribute(
        &self,
        session_id: &str,
        batch: &BatchContribution,
    ) -> Result<ContributionReceipt> {
        let body = encode_batch_contribution(batch, false)?;
        let response = self
            .http
            .post(format!("{}/contribute", self.base_url))
            .bearer_auth(session_id)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            let rejection: RejectionResponse = response.json().await.unwrap_or_default();
            return Err(Error::ContributionRejected {
                code: rejection.code,
                error: rejection.error,
            });
        }
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "contribute returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Downloads and decodes the full published transcript.
    pub async fn current_transcript(&self) -> Result<BatchTranscript> {
        let response = self
            .http
            .get(format!("{}/info/current_state", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "current_state returned {}",
                response.status()
            )));
        }
        let body = response.bytes().await?;
        decode_batch_transcript(&body)
    }
}
