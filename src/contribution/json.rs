//! Wire format for batch contributions.
//!
//! The sequencer speaks JSON with `0x`-prefixed lowercase hex of the
//! compressed point encodings (note the single lowercase p in
//! `potPubkey`). Decoding happens in two stages: a schema pass that
//! checks document shape, counts and hex formatting without touching the
//! curve, then a structural pass that hex- and curve-decodes every point
//! with the mandatory subgroup check. The structural pass parallelizes
//! per sub-ceremony and per point; the first failure aborts the batch.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{BatchContribution, Contribution, PowersOfTau};
use crate::curve::{self, G1_HEX_LEN, G2_HEX_LEN};
use crate::errors::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PowersOfTauJson {
    #[serde(rename = "G1Powers")]
    pub g1_powers: Vec<String>,
    #[serde(rename = "G2Powers")]
    pub g2_powers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ContributionJson {
    #[serde(rename = "numG1Powers")]
    pub num_g1_powers: usize,
    #[serde(rename = "numG2Powers")]
    pub num_g2_powers: usize,
    #[serde(rename = "powersOfTau")]
    pub powers_of_tau: PowersOfTauJson,
    #[serde(rename = "potPubkey")]
    pub pot_pubkey: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BatchContributionJson {
    pub contributions: Vec<ContributionJson>,
}

/// Checks that a wire string looks like a point of the given hex length:
/// `0x` prefix, exact length, hex digits only.
pub(crate) fn check_point_str(s: &str, hex_len: usize, what: &str) -> Result<()> {
    let payload = s
        .strip_prefix("0x")
        .ok_or_else(|| Error::Schema(format!("{what}: missing 0x prefix")))?;
    if s.len() != hex_len {
        return Err(Error::Schema(format!(
            "{what}: expected {hex_len} characters, got {}",
            s.len()
        )));
    }
    if !payload.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Schema(format!("{what}: non-hex characters")));
    }
    Ok(())
}

impl ContributionJson {
    fn check_schema(&self, index: usize) -> Result<()> {
        if self.num_g1_powers == 0 || self.num_g2_powers == 0 {
            return Err(Error::Schema(format!(
                "contribution {index}: power counts must be positive"
            )));
        }
        if self.num_g2_powers > self.num_g1_powers {
            return Err(Error::Schema(format!(
                "contribution {index}: more G2 than G1 powers"
            )));
        }
        if self.powers_of_tau.g1_powers.len() != self.num_g1_powers {
            return Err(Error::Schema(format!(
                "contribution {index}: {} G1 powers listed, numG1Powers is {}",
                self.powers_of_tau.g1_powers.len(),
                self.num_g1_powers
            )));
        }
        if self.powers_of_tau.g2_powers.len() != self.num_g2_powers {
            return Err(Error::Schema(format!(
                "contribution {index}: {} G2 powers listed, numG2Powers is {}",
                self.powers_of_tau.g2_powers.len(),
                self.num_g2_powers
            )));
        }
        for (j, s) in self.powers_of_tau.g1_powers.iter().enumerate() {
            check_point_str(s, G1_HEX_LEN, &format!("contribution {index} G1[{j}]"))?;
        }
        for (j, s) in self.powers_of_tau.g2_powers.iter().enumerate() {
            check_point_str(s, G2_HEX_LEN, &format!("contribution {index} G2[{j}]"))?;
        }
        check_point_str(
            &self.pot_pubkey,
            G2_HEX_LEN,
            &format!("contribution {index} potPubkey"),
        )
    }

    fn decode(&self) -> Result<Contribution> {
        let g1_powers = self
            .powers_of_tau
            .g1_powers
            .par_iter()
            .map(|s| curve::g1_from_hex(s))
            .collect::<Result<Vec<_>>>()?;
        let g2_powers = self
            .powers_of_tau
            .g2_powers
            .par_iter()
            .map(|s| curve::g2_from_hex(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Contribution {
            num_g1_powers: self.num_g1_powers,
            num_g2_powers: self.num_g2_powers,
            powers_of_tau: PowersOfTau {
                g1_powers,
                g2_powers,
            },
            pot_pubkey: curve::g2_from_hex(&self.pot_pubkey)?,
        })
    }
}

impl From<&Contribution> for ContributionJson {
    fn from(c: &Contribution) -> Self {
        ContributionJson {
            num_g1_powers: c.num_g1_powers,
            num_g2_powers: c.num_g2_powers,
            powers_of_tau: PowersOfTauJson {
                g1_powers: c.powers_of_tau.g1_powers.iter().map(curve::g1_to_hex).collect(),
                g2_powers: c.powers_of_tau.g2_powers.iter().map(curve::g2_to_hex).collect(),
            },
            pot_pubkey: curve::g2_to_hex(&c.pot_pubkey),
        }
    }
}

/// Decodes a batch contribution document, schema pass first.
pub fn decode_batch_contribution(bytes: &[u8]) -> Result<BatchContribution> {
    let wire: BatchContributionJson = serde_json::from_slice(bytes)
        .map_err(|e| Error::Schema(format!("contribution document: {e}")))?;
    if wire.contributions.is_empty() {
        return Err(Error::Schema("contribution document: no contributions".into()));
    }
    for (i, c) in wire.contributions.iter().enumerate() {
        c.check_schema(i)?;
    }

    let contributions = wire
        .contributions
        .par_iter()
        .map(ContributionJson::decode)
        .collect::<Result<Vec<_>>>()?;
    Ok(BatchContribution { contributions })
}

/// Encodes a batch contribution. Pretty mode indents with two spaces;
/// compact mode is the canonical form the sequencer expects on submit.
/// Both round-trip through [`decode_batch_contribution`].
pub fn encode_batch_contribution(batch: &BatchContribution, pretty: bool) -> Result<Vec<u8>> {
    let wire = BatchContributionJson {
        contributions: batch.contributions.iter().map(ContributionJson::from).collect(),
    };
    let encoded = if pretty {
        serde_json::to_vec_pretty(&wire)
    } else {
        serde_json::to_vec(&wire)
    };
    encoded.map_err(|e| Error::Schema(format!("encoding batch contribution: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::initial_batch;

    fn contributed_batch() -> BatchContribution {
        let mut batch = initial_batch(&[(8, 4), (4, 2)]);
        batch.contribute(&[]).unwrap();
        batch
    }

    #[test]
    fn round_trips_in_both_modes() {
        let batch = contributed_batch();
        for pretty in [true, false] {
            let encoded = encode_batch_contribution(&batch, pretty).unwrap();
            let decoded = decode_batch_contribution(&encoded).unwrap();
            assert_eq!(decoded, batch);
        }
    }

    #[test]
    fn pretty_and_compact_modes_differ_in_layout_only() {
        let batch = contributed_batch();
        let pretty = encode_batch_contribution(&batch, true).unwrap();
        let compact = encode_batch_contribution(&batch, false).unwrap();
        assert_ne!(pretty, compact);
        assert!(pretty.windows(2).any(|w| w == b"\n "));
        assert!(!compact.contains(&b'\n'));
    }

    #[test]
    fn wire_field_names_match_the_sequencer() {
        let batch = contributed_batch();
        let encoded = encode_batch_contribution(&batch, false).unwrap();
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.contains("\"numG1Powers\""));
        assert!(text.contains("\"numG2Powers\""));
        assert!(text.contains("\"powersOfTau\""));
        assert!(text.contains("\"G1Powers\""));
        assert!(text.contains("\"G2Powers\""));
        // Single lowercase p.
        assert!(text.contains("\"potPubkey\""));
        assert!(!text.contains("\"potPubKey\""));
    }

    #[test]
    fn schema_rejects_count_mismatch() {
        let batch = contributed_batch();
        let mut value: serde_json::Value =
            serde_json::from_slice(&encode_batch_contribution(&batch, false).unwrap()).unwrap();
        value["contributions"][0]["numG1Powers"] = 9.into();
        let err = decode_batch_contribution(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn schema_rejects_malformed_point_strings() {
        let batch = contributed_batch();
        let encoded = encode_batch_contribution(&batch, false).unwrap();

        let mut missing_prefix: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        let s = missing_prefix["contributions"][0]["powersOfTau"]["G1Powers"][1]
            .as_str()
            .unwrap()
            .trim_start_matches("0x")
            .to_string();
        missing_prefix["contributions"][0]["powersOfTau"]["G1Powers"][1] = format!("{s}00").into();
        assert!(matches!(
            decode_batch_contribution(missing_prefix.to_string().as_bytes()),
            Err(Error::Schema(_))
        ));

        let mut wrong_len: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        wrong_len["contributions"][0]["potPubkey"] = "0x1234".into();
        assert!(matches!(
            decode_batch_contribution(wrong_len.to_string().as_bytes()),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn schema_rejects_non_json_and_empty_batches() {
        assert!(matches!(
            decode_batch_contribution(b"not json"),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            decode_batch_contribution(br#"{"contributions": []}"#),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn invalid_points_fail_the_structural_pass() {
        let batch = contributed_batch();
        let mut value: serde_json::Value =
            serde_json::from_slice(&encode_batch_contribution(&batch, false).unwrap()).unwrap();
        // Right shape, but the compression flag is clear: passes the
        // schema pass, fails curve decoding.
        value["contributions"][0]["powersOfTau"]["G1Powers"][1] =
            format!("0x{}", "12".repeat(48)).into();
        let err = decode_batch_contribution(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
