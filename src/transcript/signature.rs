//! EIP-712 typed-data check for participant ECDSA signatures.
//!
//! Participants may sign the list of their per-sub-ceremony pubkeys with
//! the Ethereum account they authenticated with. The signed payload is
//! typed data under the domain `{name: "Ethereum KZG Ceremony",
//! version: "1.0", chainId: 1}` with types
//!
//! ```text
//! ContributionPubkey(uint256 numG1Powers,uint256 numG2Powers,bytes potPubkey)
//! PoTPubkeys(ContributionPubkey[] potPubkeys)
//! ```
//!
//! Verification recovers the signer address from the 65-byte `r‖s‖v`
//! signature and compares it, case-insensitively, with the address
//! segment of the participant id (`<provider>|<address>`).

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use once_cell::sync::Lazy;
use sha3::{Digest, Keccak256};

use super::Transcript;
use crate::errors::{Error, Result};

const DOMAIN_NAME: &str = "Ethereum KZG Ceremony";
const DOMAIN_VERSION: &str = "1.0";
const DOMAIN_CHAIN_ID: u64 = 1;

const EIP712_DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId)";
const CONTRIBUTION_PUBKEY_TYPE: &str =
    "ContributionPubkey(uint256 numG1Powers,uint256 numG2Powers,bytes potPubkey)";
// A struct type's hash covers its own definition followed by the
// definitions of every struct type it references.
const POT_PUBKEYS_TYPE: &str = "PoTPubkeys(ContributionPubkey[] potPubkeys)";

static CONTRIBUTION_PUBKEY_TYPEHASH: Lazy<[u8; 32]> =
    Lazy::new(|| keccak256(CONTRIBUTION_PUBKEY_TYPE.as_bytes()));

static POT_PUBKEYS_TYPEHASH: Lazy<[u8; 32]> = Lazy::new(|| {
    let mut encoded = POT_PUBKEYS_TYPE.as_bytes().to_vec();
    encoded.extend_from_slice(CONTRIBUTION_PUBKEY_TYPE.as_bytes());
    keccak256(&encoded)
});

static DOMAIN_SEPARATOR: Lazy<[u8; 32]> = Lazy::new(|| {
    let mut encoded = Vec::with_capacity(4 * 32);
    encoded.extend_from_slice(&keccak256(EIP712_DOMAIN_TYPE.as_bytes()));
    encoded.extend_from_slice(&keccak256(DOMAIN_NAME.as_bytes()));
    encoded.extend_from_slice(&keccak256(DOMAIN_VERSION.as_bytes()));
    encoded.extend_from_slice(&uint256(DOMAIN_CHAIN_ID));
    keccak256(&encoded)
});

fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn uint256(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Computes the typed-data digest a participant signs: the list of their
/// pubkeys across sub-ceremonies, with the power counts as metadata.
pub(crate) fn pot_pubkeys_digest(transcripts: &[Transcript], participant: usize) -> Result<[u8; 32]> {
    let mut member_hashes = Vec::with_capacity(transcripts.len() * 32);
    for transcript in transcripts {
        let pubkey = transcript
            .witness
            .pot_pubkeys
            .get(participant)
            .ok_or_else(|| {
                Error::VerificationFailed(format!(
                    "participant {participant} has no pubkey in every sub-ceremony"
                ))
            })?;
        let mut encoded = Vec::with_capacity(4 * 32);
        encoded.extend_from_slice(&*CONTRIBUTION_PUBKEY_TYPEHASH);
        encoded.extend_from_slice(&uint256(transcript.num_g1_powers as u64));
        encoded.extend_from_slice(&uint256(transcript.num_g2_powers as u64));
        encoded.extend_from_slice(&keccak256(&pubkey.to_compressed()));
        member_hashes.extend_from_slice(&keccak256(&encoded));
    }

    let mut message = Vec::with_capacity(2 * 32);
    message.extend_from_slice(&*POT_PUBKEYS_TYPEHASH);
    message.extend_from_slice(&keccak256(&member_hashes));
    let message_hash = keccak256(&message);

    let mut preimage = Vec::with_capacity(2 + 2 * 32);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(&*DOMAIN_SEPARATOR);
    preimage.extend_from_slice(&message_hash);
    Ok(keccak256(&preimage))
}

/// Derives the Ethereum address of a verifying key: the last 20 bytes of
/// the Keccak-256 hash of the uncompressed public key.
pub(crate) fn eth_address(key: &VerifyingKey) -> String {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Checks a participant's signature against the digest and their id.
/// The id carries the address as `<provider>|<address>`.
pub(crate) fn verify_participant_signature(
    digest: &[u8; 32],
    signature_hex: &str,
    participant_id: &str,
    participant: usize,
) -> Result<()> {
    let claimed = participant_id.split('|').nth(1).ok_or_else(|| {
        Error::VerificationFailed(format!(
            "participant {participant}: signed but id carries no address"
        ))
    })?;

    let payload = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = hex::decode(payload).map_err(|e| {
        Error::VerificationFailed(format!("participant {participant}: signature hex: {e}"))
    })?;
    if bytes.len() != 65 {
        return Err(Error::VerificationFailed(format!(
            "participant {participant}: signature is {} bytes, expected 65",
            bytes.len()
        )));
    }

    let signature = Signature::from_slice(&bytes[..64]).map_err(|e| {
        Error::VerificationFailed(format!("participant {participant}: signature scalars: {e}"))
    })?;
    // Accept both raw (0/1) and Ethereum-style (27/28) recovery bytes.
    let v = bytes[64];
    let recovery = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v }).ok_or_else(|| {
        Error::VerificationFailed(format!(
            "participant {participant}: invalid recovery byte {v}"
        ))
    })?;

    let recovered = VerifyingKey::recover_from_prehash(digest, &signature, recovery)
        .map_err(|e| {
            Error::VerificationFailed(format!("participant {participant}: recovery: {e}"))
        })?;
    let recovered_address = eth_address(&recovered);

    if !recovered_address.eq_ignore_ascii_case(claimed.trim()) {
        return Err(Error::VerificationFailed(format!(
            "participant {participant}: signature recovers to {recovered_address}, id claims {claimed}"
        )));
    }
    Ok(())
}
