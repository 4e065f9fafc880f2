//! Client configuration.
//!
//! Everything tunable about the online flow lives in [`ClientConfig`]:
//! the sequencer base URL and the two retry delays used by the
//! orchestrator. Deployments that want the slower lobby cadence can raise
//! `try_delay`; tests drop both delays to milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base URL of the production sequencer.
pub const DEFAULT_SEQUENCER_URL: &str = "https://seq.ceremony.ethereum.org";

/// Delay between lobby polls while waiting for a contribution slot.
pub const DEFAULT_TRY_DELAY: Duration = Duration::from_secs(15);

/// Delay between attempts to submit a computed contribution.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_secs(1);

/// Configuration for the sequencer client and orchestrator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Sequencer base URL, without a trailing slash.
    pub sequencer_url: String,
    /// Wait between `try_contribute` lobby polls.
    pub try_delay: Duration,
    /// Wait between `contribute` submission retries.
    pub send_delay: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the given sequencer URL with the
    /// default retry delays.
    pub fn new(sequencer_url: impl Into<String>) -> Self {
        Self {
            sequencer_url: sequencer_url.into(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sequencer_url: DEFAULT_SEQUENCER_URL.to_string(),
            try_delay: DEFAULT_TRY_DELAY,
            send_delay: DEFAULT_SEND_DELAY,
        }
    }
}
