//! Powers-of-tau contributions and the update engine.
//!
//! A [`BatchContribution`] carries one SRS per sub-ceremony. Contributing
//! samples a fresh secret per sub-ceremony, folds in any externally
//! supplied randomness, multiplies every power by the matching power of
//! the secret, and publishes the witness `[x]₂`. Sub-ceremonies are
//! independent and update in parallel; within one sub-ceremony the loop is
//! sequential because the running power carries across iterations.
//!
//! Secrets never leave the updating frame: each lives in a
//! [`SecretScalar`] local to one sub-ceremony's update and is wiped before
//! the update returns, on success and on error alike.

pub mod json;

use blstrs::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use ff::Field;
use group::prime::PrimeCurveAffine;
use group::Curve;
use rand::rngs::OsRng;
use rayon::prelude::*;
use zeroize::Zeroize;

use crate::curve::{self, SecretScalar};
use crate::errors::{Error, Result};

/// Parallel sequences `{[τⁱ]₁}` and `{[τⁱ]₂}` of one sub-ceremony.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowersOfTau {
    pub g1_powers: Vec<G1Affine>,
    pub g2_powers: Vec<G2Affine>,
}

/// One sub-ceremony SRS together with the contributor's witness `[x]₂`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub num_g1_powers: usize,
    pub num_g2_powers: usize,
    pub powers_of_tau: PowersOfTau,
    pub pot_pubkey: G2Affine,
}

/// Ordered list of sub-ceremony contributions. The order matches the
/// sequencer's and is part of the contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchContribution {
    pub contributions: Vec<Contribution>,
}

impl Contribution {
    /// Multiplies every stored power by the matching power of the secret
    /// and records the witness. The secret and the running power are
    /// wiped before returning.
    fn apply_update(&mut self, secret: &SecretScalar) -> Result<()> {
        let num_g1 = self.powers_of_tau.g1_powers.len();
        let num_g2 = self.powers_of_tau.g2_powers.len();
        if num_g1 != self.num_g1_powers || num_g2 != self.num_g2_powers {
            return Err(Error::Decode(format!(
                "power count mismatch: {num_g1}/{} G1, {num_g2}/{} G2",
                self.num_g1_powers, self.num_g2_powers
            )));
        }
        if num_g2 > num_g1 {
            return Err(Error::Decode(
                "more G2 than G1 powers in sub-ceremony".into(),
            ));
        }

        let x = secret.expose();
        let mut pow = Scalar::ONE;
        let mut g1_updated = Vec::with_capacity(num_g1);
        let mut g2_updated = Vec::with_capacity(num_g2);
        for k in 0..num_g1 {
            g1_updated.push(curve::g1_mul(&self.powers_of_tau.g1_powers[k], &pow));
            if k < num_g2 {
                g2_updated.push(curve::g2_mul(&self.powers_of_tau.g2_powers[k], &pow));
            }
            pow *= x;
        }
        let witness = curve::g2_mul(&curve::g2_generator(), x);
        curve::wipe_scalar(&mut pow);

        let mut g1_affine = vec![G1Affine::identity(); num_g1];
        G1Projective::batch_normalize(&g1_updated, &mut g1_affine);
        let mut g2_affine = vec![G2Affine::identity(); num_g2];
        G2Projective::batch_normalize(&g2_updated, &mut g2_affine);

        self.powers_of_tau.g1_powers = g1_affine;
        self.powers_of_tau.g2_powers = g2_affine;
        self.pot_pubkey = witness.to_affine();
        Ok(())
    }

    /// Checks that this contribution is a legitimate update of `prev`:
    /// `e(prev.G1[1], pot_pubkey) == e(self.G1[1], G2)`.
    ///
    /// Returns `Ok(false)` when the pairing does not hold and an error
    /// when either side is too short to carry the first power.
    pub fn verify(&self, prev: &Contribution) -> Result<bool> {
        let prev_power = prev
            .powers_of_tau
            .g1_powers
            .get(1)
            .ok_or_else(|| Error::VerificationFailed("previous contribution has no G1[1]".into()))?;
        let post_power = self
            .powers_of_tau
            .g1_powers
            .get(1)
            .ok_or_else(|| Error::VerificationFailed("contribution has no G1[1]".into()))?;
        Ok(curve::pairing_eq(
            prev_power,
            &self.pot_pubkey,
            post_power,
            &curve::g2_generator(),
        ))
    }
}

impl BatchContribution {
    /// Updates every sub-ceremony with a freshly sampled secret, mixing in
    /// each external randomness blob by field multiplication.
    ///
    /// Sub-ceremonies update in parallel; each secret is sampled inside
    /// its own task, stays there, and is wiped when the task finishes.
    pub fn contribute(&mut self, ext_randomness: &[Vec<u8>]) -> Result<()> {
        self.contributions.par_iter_mut().try_for_each(|contribution| {
            let mut secret = SecretScalar::random(&mut OsRng);
            for blob in ext_randomness {
                secret.mix(blob);
            }
            contribution.apply_update(&secret)
        })
    }

    /// Updates with caller-chosen secrets, one hex string ("0x…") per
    /// sub-ceremony. Only the test-vector checks use this; production
    /// contributions always sample their secrets.
    pub(crate) fn contribute_with_secrets(&mut self, secrets: &[&str]) -> Result<()> {
        if secrets.len() != self.contributions.len() {
            return Err(Error::Decode(format!(
                "{} secrets for {} sub-ceremonies",
                secrets.len(),
                self.contributions.len()
            )));
        }
        self.contributions
            .par_iter_mut()
            .zip(secrets.par_iter())
            .try_for_each(|(contribution, secret_hex)| {
                let payload = secret_hex.strip_prefix("0x").ok_or_else(|| {
                    Error::Decode("secret missing 0x prefix".into())
                })?;
                let mut bytes = hex::decode(payload)
                    .map_err(|e| Error::Decode(format!("secret hex: {e}")))?;
                let secret = SecretScalar::new(curve::fr_from_be_bytes(&bytes));
                bytes.zeroize();
                contribution.apply_update(&secret)
            })
    }

    /// Verifies every sub-ceremony against the matching entry of
    /// `prev`, in order.
    pub fn verify(&self, prev: &BatchContribution) -> Result<bool> {
        if self.contributions.len() != prev.contributions.len() {
            return Err(Error::VerificationFailed(
                "batch size differs from previous batch".into(),
            ));
        }
        for (post, pre) in self.contributions.iter().zip(prev.contributions.iter()) {
            if !post.verify(pre)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) fn initial_batch(shapes: &[(usize, usize)]) -> BatchContribution {
    // The ceremony genesis has τ = 1: every power equals the generator.
    BatchContribution {
        contributions: shapes
            .iter()
            .map(|&(num_g1, num_g2)| Contribution {
                num_g1_powers: num_g1,
                num_g2_powers: num_g2,
                powers_of_tau: PowersOfTau {
                    g1_powers: vec![curve::g1_generator(); num_g1],
                    g2_powers: vec![curve::g2_generator(); num_g2],
                },
                pot_pubkey: curve::g2_generator(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{fr_from_be_bytes, g1_generator, g2_generator};

    // Secrets from the public ceremony test vectors, plus perturbed
    // variants that must produce different powers.
    const REFERENCE_SECRETS: [&str; 4] = ["0x111100", "0x221100", "0x331100", "0x441100"];
    const PERTURBED_SECRETS: [&str; 4] = ["0x111101", "0x221101", "0x331101", "0x441101"];

    fn secret_scalar(hex_str: &str) -> Scalar {
        let bytes = hex::decode(hex_str.strip_prefix("0x").unwrap()).unwrap();
        fr_from_be_bytes(&bytes)
    }

    #[test]
    fn known_secrets_produce_expected_powers() {
        let mut batch = initial_batch(&[(8, 4), (8, 4), (8, 4), (8, 4)]);
        batch.contribute_with_secrets(&REFERENCE_SECRETS).unwrap();

        for (contribution, secret_hex) in batch.contributions.iter().zip(REFERENCE_SECRETS) {
            let x = secret_scalar(secret_hex);
            // Index 0 stays the generator regardless of the secret.
            assert_eq!(contribution.powers_of_tau.g1_powers[0], g1_generator());
            assert_eq!(contribution.powers_of_tau.g2_powers[0], g2_generator());

            let mut pow = Scalar::ONE;
            for (k, g1) in contribution.powers_of_tau.g1_powers.iter().enumerate() {
                let expected = curve::g1_mul(&g1_generator(), &pow).to_affine();
                assert_eq!(*g1, expected, "G1 power {k}");
                if let Some(g2) = contribution.powers_of_tau.g2_powers.get(k) {
                    let expected = curve::g2_mul(&g2_generator(), &pow).to_affine();
                    assert_eq!(*g2, expected, "G2 power {k}");
                }
                pow *= x;
            }
            let expected_witness = curve::g2_mul(&g2_generator(), &x).to_affine();
            assert_eq!(contribution.pot_pubkey, expected_witness);
        }
    }

    #[test]
    fn perturbed_secrets_change_every_power_but_the_first() {
        let shapes = [(8, 4), (8, 4), (8, 4), (8, 4)];
        let mut expected = initial_batch(&shapes);
        expected.contribute_with_secrets(&REFERENCE_SECRETS).unwrap();
        let mut perturbed = initial_batch(&shapes);
        perturbed.contribute_with_secrets(&PERTURBED_SECRETS).unwrap();

        for (exp, got) in expected.contributions.iter().zip(&perturbed.contributions) {
            assert_ne!(exp.pot_pubkey, got.pot_pubkey);
            for j in 0..exp.powers_of_tau.g1_powers.len() {
                if j == 0 {
                    assert_eq!(exp.powers_of_tau.g1_powers[0], got.powers_of_tau.g1_powers[0]);
                } else {
                    assert_ne!(exp.powers_of_tau.g1_powers[j], got.powers_of_tau.g1_powers[j]);
                }
            }
            for j in 1..exp.powers_of_tau.g2_powers.len() {
                assert_ne!(exp.powers_of_tau.g2_powers[j], got.powers_of_tau.g2_powers[j]);
            }
        }
    }

    #[test]
    fn sampled_contribution_self_verifies() {
        let initial = initial_batch(&[(16, 4), (8, 3)]);
        let mut updated = initial.clone();
        updated.contribute(&[]).unwrap();
        assert!(updated.verify(&initial).unwrap());

        // Mixing external blobs must not break self-verification.
        let blobs = vec![vec![0xab; 32], b"external http entropy".to_vec()];
        let mut mixed = initial.clone();
        mixed.contribute(&blobs).unwrap();
        assert!(mixed.verify(&initial).unwrap());
    }

    #[test]
    fn successive_contributions_chain() {
        let initial = initial_batch(&[(8, 4)]);
        let mut first = initial.clone();
        first.contribute(&[]).unwrap();
        let mut second = first.clone();
        second.contribute(&[]).unwrap();

        assert!(first.verify(&initial).unwrap());
        assert!(second.verify(&first).unwrap());
        // Verifying against the wrong predecessor fails.
        assert!(!second.verify(&initial).unwrap());
    }

    #[test]
    fn tampered_point_fails_verification() {
        let initial = initial_batch(&[(8, 4)]);
        let mut updated = initial.clone();
        updated.contribute(&[]).unwrap();

        let mut bad_power = updated.clone();
        let bumped = (G1Projective::from(&bad_power.contributions[0].powers_of_tau.g1_powers[1])
            + G1Projective::from(&g1_generator()))
        .to_affine();
        bad_power.contributions[0].powers_of_tau.g1_powers[1] = bumped;
        assert!(!bad_power.verify(&initial).unwrap());

        let mut bad_witness = updated.clone();
        let bumped = (G2Projective::from(&bad_witness.contributions[0].pot_pubkey)
            + G2Projective::from(&g2_generator()))
        .to_affine();
        bad_witness.contributions[0].pot_pubkey = bumped;
        assert!(!bad_witness.verify(&initial).unwrap());
    }

    #[test]
    fn verification_does_not_mutate_inputs() {
        let initial = initial_batch(&[(8, 4)]);
        let mut updated = initial.clone();
        updated.contribute(&[]).unwrap();

        let initial_before = initial.clone();
        let updated_before = updated.clone();
        let _ = updated.verify(&initial).unwrap();
        assert_eq!(initial, initial_before);
        assert_eq!(updated, updated_before);
    }

    #[test]
    fn secret_count_mismatch_is_an_error() {
        let mut batch = initial_batch(&[(4, 2), (4, 2)]);
        assert!(batch.contribute_with_secrets(&["0x01"]).is_err());
    }
}
