//! External entropy providers.
//!
//! Contributors can fold extra randomness into their secrets on top of
//! the local CSPRNG. Two providers are recognized: the drand distributed
//! randomness beacon (pinned to its mainnet chain hash, queried over two
//! public mirrors) and an arbitrary HTTPS URL whose response body is used
//! as raw bytes. Providers compose by appending to the list of blobs
//! passed to the update engine; the blobs only ever feed the scalar-field
//! reduction, so their length and structure are unconstrained.

use serde::Deserialize;
use tracing::warn;

use crate::errors::{Error, Result};

/// drand mainnet chain hash the beacon query is pinned to.
pub const DRAND_CHAIN_HASH: &str =
    "8990e7a9aaed2ffed73dbd7092123d6f289930540d7651336225dc172e51b2ce";

/// Public drand mirrors, tried in order.
pub const DRAND_MIRRORS: [&str; 2] = ["https://api.drand.sh", "https://drand.cloudflare.com"];

#[derive(Deserialize)]
struct DrandRound {
    round: u64,
    randomness: String,
}

/// Fetches the latest beacon round from drand.
///
/// Returns the randomness bytes and the round number. Mirrors are tried
/// in order; the first reachable one wins.
pub async fn from_drand(http: &reqwest::Client) -> Result<(Vec<u8>, u64)> {
    let mut last_error = None;
    for mirror in DRAND_MIRRORS {
        match fetch_drand_round(http, mirror).await {
            Ok(result) => return Ok(result),
            Err(err) => {
                warn!(mirror, %err, "drand mirror failed");
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::Entropy("no drand mirrors configured".into())))
}

async fn fetch_drand_round(http: &reqwest::Client, mirror: &str) -> Result<(Vec<u8>, u64)> {
    let url = format!("{mirror}/{DRAND_CHAIN_HASH}/public/latest");
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::Entropy(format!("querying {mirror}: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::Entropy(format!(
            "{mirror} returned {}",
            response.status()
        )));
    }
    let round: DrandRound = response
        .json()
        .await
        .map_err(|e| Error::Entropy(format!("decoding beacon round: {e}")))?;
    let bytes = hex::decode(&round.randomness)
        .map_err(|e| Error::Entropy(format!("beacon randomness hex: {e}")))?;
    Ok((bytes, round.round))
}

/// Fetches raw bytes from an arbitrary URL.
pub async fn from_url(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Entropy(format!("querying {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::Entropy(format!("{url} returned {}", response.status())));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Entropy(format!("reading {url}: {e}")))?;
    Ok(body.to_vec())
}

/// Decodes caller-supplied hex entropy ("0x" prefix optional).
pub fn from_hex(entropy: &str) -> Result<Vec<u8>> {
    let payload = entropy.strip_prefix("0x").unwrap_or(entropy);
    hex::decode(payload).map_err(|e| Error::Entropy(format!("hex entropy: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_entropy_accepts_both_prefix_forms() {
        assert_eq!(from_hex("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(from_hex("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(from_hex("0xzz"), Err(Error::Entropy(_))));
    }
}
