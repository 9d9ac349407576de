//! Signature recovery for HSM-produced ECDSA signatures
//!
//! HSMs return a bare `(r, s)` pair: no recovery id, and `s` may sit in the
//! upper half of the curve order. Ethereum verifiers need a canonical low-s
//! signature plus the parity bit that selects the signer's public key among
//! the two candidates. `recover_signature` rebuilds both against the
//! address the key is known to control.

use ethers::types::{Address, Signature, U256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// secp256k1 group order n, big-endian
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// secp256k1 group order as a `U256`
pub fn secp256k1_order() -> U256 {
    U256::from_big_endian(&SECP256K1_ORDER)
}

/// Errors from reconstructing a recoverable signature
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureRecoveryError {
    /// Neither candidate public key hashes to the expected address
    #[error("No recovery id yields address {expected:?}")]
    NoMatchingRecoveryId { expected: Address },

    /// r or s is zero or not below the curve order
    #[error("Invalid raw signature: {0}")]
    InvalidSignature(String),
}

/// A device-produced ECDSA signature with unknown recovery id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSignature {
    pub r: U256,
    pub s: U256,
}

impl RawSignature {
    /// Parse the `r || s` byte string returned by `CKM_ECDSA`
    pub fn from_bytes(raw: &[u8]) -> Result<Self, SignatureRecoveryError> {
        if raw.len() != 64 {
            return Err(SignatureRecoveryError::InvalidSignature(format!(
                "expected 64 bytes (r || s), got {}",
                raw.len()
            )));
        }
        Ok(Self {
            r: U256::from_big_endian(&raw[..32]),
            s: U256::from_big_endian(&raw[32..]),
        })
    }
}

/// Where the recovery id lands in the final `v` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VOffset {
    /// `v = 27 + recovery_id` (personal messages, EIP-712, legacy txs)
    Legacy,
    /// `v = 35 + 2 * chain_id + recovery_id` (EIP-155 transactions)
    Eip155 { chain_id: u64 },
}

impl VOffset {
    pub fn apply(&self, recovery_id: u8) -> u64 {
        match self {
            VOffset::Legacy => 27 + recovery_id as u64,
            VOffset::Eip155 { chain_id } => 35 + chain_id * 2 + recovery_id as u64,
        }
    }
}

/// A low-s signature with its recovery id resolved against a known address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: U256,
    pub s: U256,
    /// 0 or 1
    pub recovery_id: u8,
}

impl RecoverableSignature {
    /// Full Ethereum signature with the scheme-dependent `v`
    pub fn to_signature(&self, offset: VOffset) -> Signature {
        Signature {
            r: self.r,
            s: self.s,
            v: offset.apply(self.recovery_id),
        }
    }

    /// `r || s || v` with `v` in {27, 28}
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        self.r.to_big_endian(&mut out[..32]);
        self.s.to_big_endian(&mut out[32..64]);
        out[64] = VOffset::Legacy.apply(self.recovery_id) as u8;
        out
    }
}

/// Ethereum address of a secp256k1 public key: last 20 bytes of
/// keccak256 over the uncompressed point without its 0x04 tag.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Rebuild a recoverable, canonical signature from a raw HSM signature.
///
/// `s` is folded to its low form first (flipping which candidate matches),
/// then candidates 0 and 1 are tried in order. The first one whose recovered
/// key hashes to `expected` wins.
pub fn recover_signature(
    hash: &[u8; 32],
    raw: &RawSignature,
    expected: Address,
) -> Result<RecoverableSignature, SignatureRecoveryError> {
    let mut r_bytes = [0u8; 32];
    let mut s_bytes = [0u8; 32];
    raw.r.to_big_endian(&mut r_bytes);
    raw.s.to_big_endian(&mut s_bytes);

    let signature = EcdsaSignature::from_scalars(r_bytes, s_bytes)
        .map_err(|e| SignatureRecoveryError::InvalidSignature(e.to_string()))?;
    let normalized = signature.normalize_s();
    if normalized.is_some() {
        tracing::debug!("[HSM] high-s signature folded to low-s");
    }
    let signature = normalized.unwrap_or(signature);

    for candidate in 0u8..=1 {
        let recovery_id = RecoveryId::new(candidate == 1, false);
        let key = match VerifyingKey::recover_from_prehash(hash, &signature, recovery_id) {
            Ok(key) => key,
            Err(_) => continue,
        };
        if address_from_verifying_key(&key) == expected {
            let bytes = signature.to_bytes();
            return Ok(RecoverableSignature {
                r: U256::from_big_endian(&bytes[..32]),
                s: U256::from_big_endian(&bytes[32..]),
                recovery_id: candidate,
            });
        }
    }

    Err(SignatureRecoveryError::NoMatchingRecoveryId { expected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{RecoveryMessage, H256};
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;

    fn fixed_key() -> SigningKey {
        SigningKey::from_slice(&[0x42u8; 32]).unwrap()
    }

    fn raw_from(sig: &EcdsaSignature) -> RawSignature {
        RawSignature::from_bytes(&sig.to_bytes()).unwrap()
    }

    fn high_s_twin(raw: &RawSignature) -> RawSignature {
        RawSignature {
            r: raw.r,
            s: secp256k1_order() - raw.s,
        }
    }

    #[test]
    fn test_recovers_expected_address() {
        let key = fixed_key();
        let address = address_from_verifying_key(key.verifying_key());
        let hash = [0xABu8; 32];
        let sig: EcdsaSignature = key.sign_prehash(&hash).unwrap();

        let recovered = recover_signature(&hash, &raw_from(&sig), address).unwrap();
        let ethers_sig = recovered.to_signature(VOffset::Legacy);
        let signer = ethers_sig
            .recover(RecoveryMessage::Hash(H256::from(hash)))
            .unwrap();
        assert_eq!(signer, address);
    }

    #[test]
    fn test_high_s_is_canonicalized_with_flipped_parity() {
        let key = fixed_key();
        let address = address_from_verifying_key(key.verifying_key());
        let hash = [0x01u8; 32];
        let sig: EcdsaSignature = key.sign_prehash(&hash).unwrap();
        let low = raw_from(&sig);
        let high = high_s_twin(&low);

        let from_low = recover_signature(&hash, &low, address).unwrap();
        let from_high = recover_signature(&hash, &high, address).unwrap();

        assert_eq!(from_low, from_high);
        assert!(from_high.s <= secp256k1_order() / 2);
    }

    #[test]
    fn test_recovery_id_found_for_many_hashes() {
        // Both parities show up across hashes; each must be resolved.
        let key = fixed_key();
        let address = address_from_verifying_key(key.verifying_key());
        let mut seen = [false; 2];
        for i in 0u8..32 {
            let hash = [i; 32];
            let sig: EcdsaSignature = key.sign_prehash(&hash).unwrap();
            let recovered = recover_signature(&hash, &raw_from(&sig), address).unwrap();
            seen[recovered.recovery_id as usize] = true;
            let sig = recovered.to_signature(VOffset::Legacy);
            assert_eq!(sig.recover(RecoveryMessage::Hash(H256::from(hash))).unwrap(), address);
        }
        assert!(seen[0] && seen[1]);
    }

    #[test]
    fn test_foreign_address_fails() {
        let key = fixed_key();
        let hash = [0x02u8; 32];
        let sig: EcdsaSignature = key.sign_prehash(&hash).unwrap();
        let stranger = Address::repeat_byte(0x11);

        let result = recover_signature(&hash, &raw_from(&sig), stranger);
        assert_eq!(
            result,
            Err(SignatureRecoveryError::NoMatchingRecoveryId { expected: stranger })
        );
    }

    #[test]
    fn test_zero_r_is_invalid() {
        let raw = RawSignature { r: U256::zero(), s: U256::one() };
        let result = recover_signature(&[0u8; 32], &raw, Address::zero());
        assert!(matches!(result, Err(SignatureRecoveryError::InvalidSignature(_))));
    }

    #[test]
    fn test_raw_signature_length_checked() {
        assert!(RawSignature::from_bytes(&[0u8; 63]).is_err());
        assert!(RawSignature::from_bytes(&[1u8; 64]).is_ok());
    }

    #[test]
    fn test_v_offsets() {
        assert_eq!(VOffset::Legacy.apply(0), 27);
        assert_eq!(VOffset::Legacy.apply(1), 28);
        assert_eq!(VOffset::Eip155 { chain_id: 1 }.apply(0), 37);
        assert_eq!(VOffset::Eip155 { chain_id: 11155111 }.apply(1), 22310258);
    }

    #[test]
    fn test_to_bytes_layout() {
        let sig = RecoverableSignature {
            r: U256::from(1u64),
            s: U256::from(2u64),
            recovery_id: 1,
        };
        let bytes = sig.to_bytes();
        assert_eq!(bytes[31], 1);
        assert_eq!(bytes[63], 2);
        assert_eq!(bytes[64], 28);
    }
}
