//! Wire format for batch transcripts.
//!
//! Same two-stage decode as the contribution codec: a schema pass over
//! the document shape, then a parallel structural pass with curve decoding
//! and subgroup checks. BLS signatures and ECDSA signatures are optional
//! on the wire; an empty string means absent and is never an error.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{BatchTranscript, Transcript, Witness};
use crate::contribution::json::{check_point_str, PowersOfTauJson};
use crate::contribution::PowersOfTau;
use crate::curve::{self, G1_HEX_LEN, G2_HEX_LEN};
use crate::errors::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WitnessJson {
    #[serde(rename = "runningProducts")]
    pub running_products: Vec<String>,
    #[serde(rename = "potPubKeys")]
    pub pot_pubkeys: Vec<String>,
    #[serde(rename = "blsSignatures")]
    pub bls_signatures: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TranscriptJson {
    #[serde(rename = "numG1Powers")]
    pub num_g1_powers: usize,
    #[serde(rename = "numG2Powers")]
    pub num_g2_powers: usize,
    #[serde(rename = "powersOfTau")]
    pub powers_of_tau: PowersOfTauJson,
    pub witness: WitnessJson,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BatchTranscriptJson {
    pub transcripts: Vec<TranscriptJson>,
    #[serde(rename = "participantIds")]
    pub participant_ids: Vec<String>,
    #[serde(rename = "participantEcdsaSignatures")]
    pub participant_ecdsa_signatures: Vec<String>,
}

impl TranscriptJson {
    fn check_schema(&self, index: usize, participants: usize) -> Result<()> {
        if self.num_g1_powers == 0 || self.num_g2_powers == 0 {
            return Err(Error::Schema(format!(
                "transcript {index}: power counts must be positive"
            )));
        }
        if self.num_g2_powers > self.num_g1_powers {
            return Err(Error::Schema(format!(
                "transcript {index}: more G2 than G1 powers"
            )));
        }
        if self.powers_of_tau.g1_powers.len() != self.num_g1_powers
            || self.powers_of_tau.g2_powers.len() != self.num_g2_powers
        {
            return Err(Error::Schema(format!(
                "transcript {index}: listed powers do not match power counts"
            )));
        }
        let witness = &self.witness;
        if witness.running_products.len() != witness.pot_pubkeys.len()
            || witness.bls_signatures.len() != witness.pot_pubkeys.len()
        {
            return Err(Error::Schema(format!(
                "transcript {index}: witness sequences have uneven lengths"
            )));
        }
        if witness.pot_pubkeys.len() != participants {
            return Err(Error::Schema(format!(
                "transcript {index}: {} witness entries for {participants} participants",
                witness.pot_pubkeys.len()
            )));
        }
        for (j, s) in self.powers_of_tau.g1_powers.iter().enumerate() {
            check_point_str(s, G1_HEX_LEN, &format!("transcript {index} G1[{j}]"))?;
        }
        for (j, s) in self.powers_of_tau.g2_powers.iter().enumerate() {
            check_point_str(s, G2_HEX_LEN, &format!("transcript {index} G2[{j}]"))?;
        }
        for (j, s) in witness.running_products.iter().enumerate() {
            check_point_str(s, G1_HEX_LEN, &format!("transcript {index} runningProducts[{j}]"))?;
        }
        for (j, s) in witness.pot_pubkeys.iter().enumerate() {
            check_point_str(s, G2_HEX_LEN, &format!("transcript {index} potPubKeys[{j}]"))?;
        }
        for (j, s) in witness.bls_signatures.iter().enumerate() {
            if !s.is_empty() {
                check_point_str(s, G1_HEX_LEN, &format!("transcript {index} blsSignatures[{j}]"))?;
            }
        }
        Ok(())
    }

    fn decode(&self) -> Result<Transcript> {
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
        let running_products = self
            .witness
            .running_products
            .par_iter()
            .map(|s| curve::g1_from_hex(s))
            .collect::<Result<Vec<_>>>()?;
        let pot_pubkeys = self
            .witness
            .pot_pubkeys
            .par_iter()
            .map(|s| curve::g2_from_hex(s))
            .collect::<Result<Vec<_>>>()?;
        let bls_signatures = self
            .witness
            .bls_signatures
            .par_iter()
            .map(|s| {
                if s.is_empty() {
                    Ok(None)
                } else {
                    curve::g1_from_hex(s).map(Some)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Transcript {
            num_g1_powers: self.num_g1_powers,
            num_g2_powers: self.num_g2_powers,
            powers_of_tau: PowersOfTau {
                g1_powers,
                g2_powers,
            },
            witness: Witness {
                running_products,
                pot_pubkeys,
                bls_signatures,
            },
        })
    }
}

impl From<&Transcript> for TranscriptJson {
    fn from(t: &Transcript) -> Self {
        TranscriptJson {
            num_g1_powers: t.num_g1_powers,
            num_g2_powers: t.num_g2_powers,
            powers_of_tau: PowersOfTauJson {
                g1_powers: t.powers_of_tau.g1_powers.iter().map(curve::g1_to_hex).collect(),
                g2_powers: t.powers_of_tau.g2_powers.iter().map(curve::g2_to_hex).collect(),
            },
            witness: WitnessJson {
                running_products: t
                    .witness
                    .running_products
                    .iter()
                    .map(curve::g1_to_hex)
                    .collect(),
                pot_pubkeys: t.witness.pot_pubkeys.iter().map(curve::g2_to_hex).collect(),
                bls_signatures: t
                    .witness
                    .bls_signatures
                    .iter()
                    .map(|s| s.as_ref().map(curve::g1_to_hex).unwrap_or_default())
                    .collect(),
            },
        }
    }
}

/// Decodes a batch transcript document, schema pass first.
pub fn decode_batch_transcript(bytes: &[u8]) -> Result<BatchTranscript> {
    let wire: BatchTranscriptJson = serde_json::from_slice(bytes)
        .map_err(|e| Error::Schema(format!("transcript document: {e}")))?;
    if wire.transcripts.is_empty() {
        return Err(Error::Schema("transcript document: no transcripts".into()));
    }
    if wire.participant_ids.len() != wire.participant_ecdsa_signatures.len() {
        return Err(Error::Schema(
            "transcript document: participant id and signature counts differ".into(),
        ));
    }
    for (i, t) in wire.transcripts.iter().enumerate() {
        t.check_schema(i, wire.participant_ids.len())?;
    }

    let transcripts = wire
        .transcripts
        .par_iter()
        .map(TranscriptJson::decode)
        .collect::<Result<Vec<_>>>()?;
    Ok(BatchTranscript {
        transcripts,
        participant_ids: wire.participant_ids,
        participant_ecdsa_signatures: wire.participant_ecdsa_signatures,
    })
}

/// Encodes a batch transcript in the sequencer's wire form.
pub fn encode_batch_transcript(batch: &BatchTranscript, pretty: bool) -> Result<Vec<u8>> {
    let wire = BatchTranscriptJson {
        transcripts: batch.transcripts.iter().map(TranscriptJson::from).collect(),
        participant_ids: batch.participant_ids.clone(),
        participant_ecdsa_signatures: batch.participant_ecdsa_signatures.clone(),
    };
    let encoded = if pretty {
        serde_json::to_vec_pretty(&wire)
    } else {
        serde_json::to_vec(&wire)
    };
    encoded.map_err(|e| Error::Schema(format!("encoding batch transcript: {e}")))
}
