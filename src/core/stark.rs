//! STARK key pair
//!
//! Private → public key derivation on the StarkEx curve
//! (`y² = x³ + α·x + β` over the Stark prime field). Only the key pair is
//! needed for onboarding; order and transfer hashing live with the exchange
//! client, not here.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use starknet_crypto::FieldElement;
use starknet_curve::curve_params::{EC_ORDER, GENERATOR};
use thiserror::Error;

/// Errors from building a STARK key pair
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StarkKeyError {
    #[error("Invalid STARK private key hex: {0}")]
    InvalidHex(String),

    /// Reduces to zero modulo the curve order
    #[error("STARK private key is zero modulo the curve order")]
    ZeroKey,
}

/// STARK key pair, hex-encoded the way the exchange expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarkKeyPair {
    pub public_key: String,
    pub public_key_y_coordinate: String,
    pub private_key: String,
}

impl StarkKeyPair {
    /// Build from a hex private key (with or without `0x`), reduced mod the
    /// curve order.
    pub fn from_private_key(hex_key: &str) -> Result<Self, StarkKeyError> {
        let digits = hex_key.trim().trim_start_matches("0x");
        let scalar = BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| StarkKeyError::InvalidHex(hex_key.to_string()))?;
        Self::from_scalar(scalar)
    }

    /// Deterministic key from an Ethereum typed signature:
    /// `(keccak256(signature) >> 5) mod n`
    pub fn derive_from_signature(signature: &[u8]) -> Result<Self, StarkKeyError> {
        let digest = Keccak256::digest(signature);
        Self::from_scalar(BigUint::from_bytes_be(&digest) >> 5)
    }

    fn from_scalar(scalar: BigUint) -> Result<Self, StarkKeyError> {
        let order = BigUint::from_bytes_be(&EC_ORDER.to_bytes_be());
        let private = scalar % order;
        if private.is_zero() {
            return Err(StarkKeyError::ZeroKey);
        }

        let point = &GENERATOR * &to_field(&private).to_bits_le()[..];
        if point.infinity {
            return Err(StarkKeyError::ZeroKey);
        }

        Ok(Self {
            public_key: to_hex(&point.x),
            public_key_y_coordinate: to_hex(&point.y),
            private_key: format!("0x{:x}", private),
        })
    }
}

/// `value` must be below the field prime (any reduced scalar is)
fn to_field(value: &BigUint) -> FieldElement {
    let bytes = value.to_bytes_be();
    let mut padded = [0u8; 32];
    padded[32 - bytes.len()..].copy_from_slice(&bytes);
    FieldElement::from_bytes_be(&padded).unwrap_or(FieldElement::ZERO)
}

fn to_hex(value: &FieldElement) -> String {
    format!("0x{:x}", BigUint::from_bytes_be(&value.to_bytes_be()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet_curve::curve_params::{ALPHA, BETA};

    fn field(hex: &str) -> FieldElement {
        FieldElement::from_hex_be(hex).unwrap()
    }

    #[test]
    fn test_public_key_matches_starknet_crypto() {
        for hex in ["0x1", "0x2", "0x3c1e9550e66958296d11b60f8e8e7a7ad990d07fa65d5f7652c4a6c87d4e3cc"] {
            let pair = StarkKeyPair::from_private_key(hex).unwrap();
            let expected = starknet_crypto::get_public_key(&field(hex));
            assert_eq!(field(&pair.public_key), expected, "key {}", hex);
        }
    }

    #[test]
    fn test_public_point_is_on_curve() {
        let pair = StarkKeyPair::from_private_key("0xdeadbeef").unwrap();
        let x = field(&pair.public_key);
        let y = field(&pair.public_key_y_coordinate);
        assert_eq!(y * y, x * x * x + ALPHA * x + BETA);
    }

    #[test]
    fn test_private_key_one_gives_generator() {
        let pair = StarkKeyPair::from_private_key("1").unwrap();
        assert_eq!(field(&pair.public_key), GENERATOR.x);
        assert_eq!(field(&pair.public_key_y_coordinate), GENERATOR.y);
        assert_eq!(pair.private_key, "0x1");
    }

    #[test]
    fn test_private_key_reduced_mod_order() {
        let order = BigUint::from_bytes_be(&EC_ORDER.to_bytes_be());
        let above = format!("0x{:x}", order + BigUint::from(5u8));
        let pair = StarkKeyPair::from_private_key(&above).unwrap();
        assert_eq!(pair, StarkKeyPair::from_private_key("0x5").unwrap());
    }

    #[test]
    fn test_zero_and_garbage_rejected() {
        assert_eq!(StarkKeyPair::from_private_key("0x0"), Err(StarkKeyError::ZeroKey));
        let order = format!("0x{:x}", BigUint::from_bytes_be(&EC_ORDER.to_bytes_be()));
        assert_eq!(StarkKeyPair::from_private_key(&order), Err(StarkKeyError::ZeroKey));
        assert!(matches!(
            StarkKeyPair::from_private_key("0xnothex"),
            Err(StarkKeyError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let signature = [0x5Cu8; 66];
        let a = StarkKeyPair::derive_from_signature(&signature).unwrap();
        let b = StarkKeyPair::derive_from_signature(&signature).unwrap();
        assert_eq!(a, b);

        let other = StarkKeyPair::derive_from_signature(&[0x5Du8; 66]).unwrap();
        assert_ne!(a.public_key, other.public_key);
    }

    #[test]
    fn test_serializes_as_hex_strings() {
        let pair = StarkKeyPair::from_private_key("0x1").unwrap();
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["private_key"], "0x1");
        assert!(json["public_key"].as_str().unwrap().starts_with("0x"));
        assert!(json["public_key_y_coordinate"].as_str().unwrap().starts_with("0x"));
    }
}
