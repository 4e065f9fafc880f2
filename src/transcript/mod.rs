//! Ceremony transcripts and the verification battery.
//!
//! A [`BatchTranscript`] is the sequencer's published history: per
//! sub-ceremony the final powers plus a witness trail (running products
//! and participant pubkeys), and per participant an opaque id and an
//! optional ECDSA signature over their pubkeys.
//!
//! [`BatchTranscript::verify`] re-checks the whole history:
//!
//! - every running product was obtained by a legitimate update
//!   (`e(rp[k], pk[k+1]) == e(rp[k+1], G2)`);
//! - the G1 powers are coherent (`e(G1[j], G2[1]) == e(G1[j+1], G2)`);
//! - the G2 powers are coherent (`e(G1[1], G2[j]) == e(G1, G2[j+1])`);
//! - every non-empty ECDSA signature recovers to the participant's
//!   address under the ceremony's typed-data digest.
//!
//! The pairing checks are independent and run as one flat task list on
//! the rayon pool; the first failure wins. Subgroup membership is a
//! precondition established by the codec: every point in these structures
//! entered through a checked decode.

pub mod json;
pub(crate) mod signature;

use blstrs::{G1Affine, G2Affine};
use group::prime::PrimeCurveAffine;
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::contribution::{BatchContribution, Contribution, PowersOfTau};
use crate::curve;
use crate::errors::{Error, Result};

/// History of one sub-ceremony.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    pub num_g1_powers: usize,
    pub num_g2_powers: usize,
    pub powers_of_tau: PowersOfTau,
    pub witness: Witness,
}

/// Witness trail of one sub-ceremony. `running_products[k]` is the G1[1]
/// value after the k-th participant; `pot_pubkeys[k]` is that
/// participant's `[x]₂`. BLS signatures are optional on the wire (an
/// empty string means absent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness {
    pub running_products: Vec<G1Affine>,
    pub pot_pubkeys: Vec<G2Affine>,
    pub bls_signatures: Vec<Option<G1Affine>>,
}

/// The full published ceremony state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchTranscript {
    pub transcripts: Vec<Transcript>,
    /// Opaque ids of the form `<provider>|<address>`.
    pub participant_ids: Vec<String>,
    /// Hex ECDSA signatures; an empty string means unsigned.
    pub participant_ecdsa_signatures: Vec<String>,
}

/// One pairing check of the battery, identified by transcript and index.
enum PairingCheck {
    /// `e(rp[k], pk[k+1]) == e(rp[k+1], G2)`
    Update { t: usize, k: usize },
    /// `e(G1[j], G2[1]) == e(G1[j+1], G2)`
    G1Power { t: usize, j: usize },
    /// `e(G1[1], G2[j]) == e(G1, G2[j+1])`
    G2Power { t: usize, j: usize },
}

impl BatchTranscript {
    /// Verifies the whole transcript. Any failed check is fatal; the
    /// first error encountered is returned. `cancel` is observed at task
    /// granularity: in-flight checks finish, no new ones start.
    pub fn verify(&self, cancel: &CancelToken) -> Result<()> {
        self.check_sizes()?;

        let mut checks = Vec::new();
        for (t, transcript) in self.transcripts.iter().enumerate() {
            let witness_len = transcript.witness.running_products.len();
            for k in 0..witness_len.saturating_sub(1) {
                checks.push(PairingCheck::Update { t, k });
            }
            let num_g1 = transcript.powers_of_tau.g1_powers.len();
            for j in 1..num_g1.saturating_sub(1) {
                checks.push(PairingCheck::G1Power { t, j });
            }
            let num_g2 = transcript.powers_of_tau.g2_powers.len();
            for j in 1..num_g2.saturating_sub(1) {
                checks.push(PairingCheck::G2Power { t, j });
            }
        }

        checks.par_iter().try_for_each(|check| {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.run_check(check)
        })?;

        self.check_signatures(cancel)
    }

    fn check_sizes(&self) -> Result<()> {
        if self.transcripts.is_empty() {
            return Err(Error::VerificationFailed("no transcripts".into()));
        }
        if self.participant_ids.len() != self.participant_ecdsa_signatures.len() {
            return Err(Error::VerificationFailed(
                "participant id and signature counts differ".into(),
            ));
        }
        for (t, transcript) in self.transcripts.iter().enumerate() {
            let pot = &transcript.powers_of_tau;
            if pot.g1_powers.len() != transcript.num_g1_powers
                || pot.g2_powers.len() != transcript.num_g2_powers
            {
                return Err(Error::VerificationFailed(format!(
                    "transcript {t}: power counts do not match listed powers"
                )));
            }
            // The coherence checks pair against G1[1] and G2[1].
            if transcript.num_g1_powers < 2 || transcript.num_g2_powers < 2 {
                return Err(Error::VerificationFailed(format!(
                    "transcript {t}: too few powers for coherence checks"
                )));
            }
            let witness = &transcript.witness;
            if witness.running_products.len() != witness.pot_pubkeys.len()
                || witness.running_products.is_empty()
            {
                return Err(Error::VerificationFailed(format!(
                    "transcript {t}: witness sequences are empty or uneven"
                )));
            }
        }
        Ok(())
    }

    fn run_check(&self, check: &PairingCheck) -> Result<()> {
        match *check {
            PairingCheck::Update { t, k } => {
                let witness = &self.transcripts[t].witness;
                let ok = curve::pairing_eq(
                    &witness.running_products[k],
                    &witness.pot_pubkeys[k + 1],
                    &witness.running_products[k + 1],
                    &curve::g2_generator(),
                );
                if !ok {
                    return Err(Error::VerificationFailed(format!(
                        "transcript {t}: running product {} is not a valid update of product {k}",
                        k + 1
                    )));
                }
            }
            PairingCheck::G1Power { t, j } => {
                let pot = &self.transcripts[t].powers_of_tau;
                let ok = curve::pairing_eq(
                    &pot.g1_powers[j],
                    &pot.g2_powers[1],
                    &pot.g1_powers[j + 1],
                    &curve::g2_generator(),
                );
                if !ok {
                    return Err(Error::VerificationFailed(format!(
                        "transcript {t}: G1 power {} is not tau times power {j}",
                        j + 1
                    )));
                }
            }
            PairingCheck::G2Power { t, j } => {
                let pot = &self.transcripts[t].powers_of_tau;
                let ok = curve::pairing_eq(
                    &pot.g1_powers[1],
                    &pot.g2_powers[j],
                    &curve::g1_generator(),
                    &pot.g2_powers[j + 1],
                );
                if !ok {
                    return Err(Error::VerificationFailed(format!(
                        "transcript {t}: G2 power {} is not tau times power {j}",
                        j + 1
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_signatures(&self, cancel: &CancelToken) -> Result<()> {
        self.participant_ecdsa_signatures
            .par_iter()
            .enumerate()
            .try_for_each(|(i, sig)| {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if sig.is_empty() {
                    // Unsigned participants are fine.
                    return Ok(());
                }
                let digest = signature::pot_pubkeys_digest(&self.transcripts, i)?;
                signature::verify_participant_signature(&digest, sig, &self.participant_ids[i], i)
            })
    }

    /// Projects the transcript into a fresh contribution state: the final
    /// powers of each sub-ceremony with an identity witness, ready to be
    /// written out for an offline contribution.
    pub fn to_batch_contribution(&self) -> BatchContribution {
        BatchContribution {
            contributions: self
                .transcripts
                .iter()
                .map(|t| Contribution {
                    num_g1_powers: t.num_g1_powers,
                    num_g2_powers: t.num_g2_powers,
                    powers_of_tau: t.powers_of_tau.clone(),
                    pot_pubkey: G2Affine::identity(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builders for synthetic transcripts with known secrets.

    use blstrs::Scalar;
    use ff::Field;
    use group::Curve;

    use super::*;

    /// Builds the transcript of one sub-ceremony after the given
    /// participants (by secret) contributed in order, starting from the
    /// genesis state tau = 1.
    pub fn transcript_with_secrets(
        num_g1: usize,
        num_g2: usize,
        secrets: &[Scalar],
    ) -> Transcript {
        let g1 = curve::g1_generator();
        let g2 = curve::g2_generator();

        let mut tau = Scalar::ONE;
        let mut running_products = vec![g1];
        let mut pot_pubkeys = vec![g2];
        for secret in secrets {
            tau *= secret;
            running_products.push(curve::g1_mul(&g1, &tau).to_affine());
            pot_pubkeys.push(curve::g2_mul(&g2, secret).to_affine());
        }

        let mut g1_powers = Vec::with_capacity(num_g1);
        let mut g2_powers = Vec::with_capacity(num_g2);
        let mut pow = Scalar::ONE;
        for k in 0..num_g1 {
            g1_powers.push(curve::g1_mul(&g1, &pow).to_affine());
            if k < num_g2 {
                g2_powers.push(curve::g2_mul(&g2, &pow).to_affine());
            }
            pow *= tau;
        }

        let bls_signatures = vec![None; pot_pubkeys.len()];
        Transcript {
            num_g1_powers: num_g1,
            num_g2_powers: num_g2,
            powers_of_tau: PowersOfTau {
                g1_powers,
                g2_powers,
            },
            witness: Witness {
                running_products,
                pot_pubkeys,
                bls_signatures,
            },
        }
    }

    /// A two-sub-ceremony batch transcript with unsigned participants.
    pub fn batch_with_secrets(secrets: &[Scalar]) -> BatchTranscript {
        let participants = secrets.len() + 1;
        BatchTranscript {
            transcripts: vec![
                transcript_with_secrets(8, 4, secrets),
                transcript_with_secrets(4, 2, secrets),
            ],
            participant_ids: (0..participants)
                .map(|i| format!("eth|0x{:040x}", i))
                .collect(),
            participant_ecdsa_signatures: vec![String::new(); participants],
        }
    }
}

#[cfg(test)]
mod tests {
    use blstrs::{G1Projective, Scalar};
    use group::Curve;

    use super::test_support::batch_with_secrets;
    use super::*;

    fn secrets() -> Vec<Scalar> {
        vec![Scalar::from(0x111100u64), Scalar::from(0x221100u64)]
    }

    #[test]
    fn consistent_transcript_verifies() {
        let batch = batch_with_secrets(&secrets());
        batch.verify(&CancelToken::new()).unwrap();
    }

    #[test]
    fn flipped_running_product_fails() {
        let mut batch = batch_with_secrets(&secrets());
        let bumped = (G1Projective::from(&batch.transcripts[0].witness.running_products[1])
            + G1Projective::from(&curve::g1_generator()))
        .to_affine();
        batch.transcripts[0].witness.running_products[1] = bumped;
        let err = batch.verify(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn flipped_g1_power_fails() {
        let mut batch = batch_with_secrets(&secrets());
        let bumped = (G1Projective::from(&batch.transcripts[1].powers_of_tau.g1_powers[2])
            + G1Projective::from(&curve::g1_generator()))
        .to_affine();
        batch.transcripts[1].powers_of_tau.g1_powers[2] = bumped;
        let err = batch.verify(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn flipped_g2_power_fails() {
        let mut batch = batch_with_secrets(&secrets());
        let bumped = (blstrs::G2Projective::from(&batch.transcripts[0].powers_of_tau.g2_powers[2])
            + blstrs::G2Projective::from(&curve::g2_generator()))
        .to_affine();
        batch.transcripts[0].powers_of_tau.g2_powers[2] = bumped;
        let err = batch.verify(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn uneven_witness_fails_size_check() {
        let mut batch = batch_with_secrets(&secrets());
        batch.transcripts[0].witness.pot_pubkeys.pop();
        let err = batch.verify(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn cancelled_verification_reports_cancellation() {
        let batch = batch_with_secrets(&secrets());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = batch.verify(&cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn verification_does_not_mutate_the_transcript() {
        let batch = batch_with_secrets(&secrets());
        let before = batch.clone();
        batch.verify(&CancelToken::new()).unwrap();
        assert_eq!(batch, before);
    }

    #[test]
    fn projection_keeps_powers_and_clears_witness() {
        let batch = batch_with_secrets(&secrets());
        let state = batch.to_batch_contribution();
        assert_eq!(state.contributions.len(), batch.transcripts.len());
        for (c, t) in state.contributions.iter().zip(&batch.transcripts) {
            assert_eq!(c.num_g1_powers, t.num_g1_powers);
            assert_eq!(c.powers_of_tau, t.powers_of_tau);
            assert_eq!(c.pot_pubkey, G2Affine::identity());
        }
    }
}
