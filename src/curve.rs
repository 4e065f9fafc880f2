//! BLS12-381 primitives used by the ceremony.
//!
//! A thin façade over `blstrs`: scalar sampling and reduction, compressed
//! point (de)serialization in the `0x`-prefixed hex form the sequencer
//! speaks, and the pairing-equality helper every verification check is
//! built from.
//!
//! Two invariants are enforced here and relied on everywhere else:
//!
//! - every decoded point passes the prime-order subgroup check
//!   (`from_compressed` rejects anything outside the subgroup);
//! - secret scalars are held in [`SecretScalar`], which overwrites its
//!   contents when dropped.

use blstrs::{G1Affine, G1Projective, G2Affine, G2Projective, Gt, Scalar};
use ff::Field;
use group::prime::PrimeCurveAffine;
use rand_core::RngCore;
use zeroize::Zeroize;

use crate::errors::{Error, Result};

/// Compressed G1 encoding length in bytes.
pub const G1_COMPRESSED_SIZE: usize = 48;

/// Compressed G2 encoding length in bytes.
pub const G2_COMPRESSED_SIZE: usize = 96;

/// Length of a G1 point string on the wire: "0x" plus 96 hex characters.
pub const G1_HEX_LEN: usize = 2 + 2 * G1_COMPRESSED_SIZE;

/// Length of a G2 point string on the wire: "0x" plus 192 hex characters.
pub const G2_HEX_LEN: usize = 2 + 2 * G2_COMPRESSED_SIZE;

/// Returns the standard G1 generator in affine form.
pub fn g1_generator() -> G1Affine {
    G1Affine::generator()
}

/// Returns the standard G2 generator in affine form.
pub fn g2_generator() -> G2Affine {
    G2Affine::generator()
}

/// Samples a uniform scalar from a cryptographically strong RNG.
pub fn sample_fr<R: RngCore + ?Sized>(rng: &mut R) -> Scalar {
    <Scalar as Field>::random(rng)
}

/// Interprets `bytes` as a big-endian integer and reduces it modulo the
/// scalar field order. Accepts any length, including empty input (which
/// maps to zero).
pub fn fr_from_be_bytes(bytes: &[u8]) -> Scalar {
    let radix = Scalar::from(256u64);
    let mut acc = Scalar::ZERO;
    for byte in bytes {
        acc = acc * radix + Scalar::from(u64::from(*byte));
    }
    acc
}

/// Overwrites a scalar in place. `Scalar` is a plain value type, so a
/// volatile write followed by a compiler fence is sufficient to keep the
/// wipe from being optimized out.
pub(crate) fn wipe_scalar(scalar: &mut Scalar) {
    unsafe { core::ptr::write_volatile(scalar, Scalar::ZERO) };
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

/// A secret scalar that wipes itself on drop.
///
/// The update engine keeps each sub-ceremony's secret inside one of these
/// for the duration of a single update; it never crosses a task boundary
/// by value and never lands in a serializable structure.
pub struct SecretScalar(Scalar);

impl SecretScalar {
    /// Wraps an already-derived secret.
    pub fn new(scalar: Scalar) -> Self {
        Self(scalar)
    }

    /// Samples a fresh uniform secret.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Self(sample_fr(rng))
    }

    /// Folds an externally supplied randomness blob into the secret by
    /// field multiplication. The fold is commutative, so the order of
    /// blobs does not affect the result.
    pub fn mix(&mut self, blob: &[u8]) {
        self.0 *= fr_from_be_bytes(blob);
    }

    /// Borrows the underlying scalar. Callers must not copy it into
    /// longer-lived storage.
    pub fn expose(&self) -> &Scalar {
        &self.0
    }
}

impl Zeroize for SecretScalar {
    fn zeroize(&mut self) {
        wipe_scalar(&mut self.0);
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl zeroize::ZeroizeOnDrop for SecretScalar {}

fn hex_payload<'a>(input: &'a str, expected_len: usize, what: &str) -> Result<&'a str> {
    let payload = input
        .strip_prefix("0x")
        .ok_or_else(|| Error::Decode(format!("{what}: missing 0x prefix")))?;
    if input.len() != expected_len {
        return Err(Error::Decode(format!(
            "{what}: expected {expected_len} characters, got {}",
            input.len()
        )));
    }
    Ok(payload)
}

/// Decodes a `0x`-prefixed compressed G1 point, rejecting anything that is
/// not on the curve or not in the prime-order subgroup.
pub fn g1_from_hex(input: &str) -> Result<G1Affine> {
    let payload = hex_payload(input, G1_HEX_LEN, "G1 point")?;
    let bytes = hex::decode(payload).map_err(|e| Error::Decode(format!("G1 point: {e}")))?;
    let repr: [u8; G1_COMPRESSED_SIZE] = bytes
        .as_slice()
        .try_into()
        .expect("length checked above");
    Option::<G1Affine>::from(G1Affine::from_compressed(&repr)).ok_or_else(|| {
        Error::Decode("G1 point: not on curve or outside the prime-order subgroup".into())
    })
}

/// Decodes a `0x`-prefixed compressed G2 point, rejecting anything that is
/// not on the curve or not in the prime-order subgroup.
pub fn g2_from_hex(input: &str) -> Result<G2Affine> {
    let payload = hex_payload(input, G2_HEX_LEN, "G2 point")?;
    let bytes = hex::decode(payload).map_err(|e| Error::Decode(format!("G2 point: {e}")))?;
    let repr: [u8; G2_COMPRESSED_SIZE] = bytes
        .as_slice()
        .try_into()
        .expect("length checked above");
    Option::<G2Affine>::from(G2Affine::from_compressed(&repr)).ok_or_else(|| {
        Error::Decode("G2 point: not on curve or outside the prime-order subgroup".into())
    })
}

/// Encodes a G1 point as "0x" plus lowercase hex of the compressed form.
pub fn g1_to_hex(point: &G1Affine) -> String {
    format!("0x{}", hex::encode(point.to_compressed()))
}

/// Encodes a G2 point as "0x" plus lowercase hex of the compressed form.
pub fn g2_to_hex(point: &G2Affine) -> String {
    format!("0x{}", hex::encode(point.to_compressed()))
}

/// Checks `e(a1, a2) == e(b1, b2)`.
pub fn pairing_eq(a1: &G1Affine, a2: &G2Affine, b1: &G1Affine, b2: &G2Affine) -> bool {
    blstrs::pairing(a1, a2) == blstrs::pairing(b1, b2)
}

/// Multiplies an affine G1 point by a scalar, staying projective.
pub(crate) fn g1_mul(point: &G1Affine, scalar: &Scalar) -> G1Projective {
    G1Projective::from(point) * scalar
}

/// Multiplies an affine G2 point by a scalar, staying projective.
pub(crate) fn g2_mul(point: &G2Affine, scalar: &Scalar) -> G2Projective {
    G2Projective::from(point) * scalar
}

/// Pairing output, re-exported for callers comparing check results.
pub type PairingOutput = Gt;
