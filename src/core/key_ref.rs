//! HSM key reference
//!
//! Binds a device key label to the Ethereum address of its public point.

use std::fmt;

use ethers::types::Address;
use ethers::utils::to_checksum;
use k256::ecdsa::VerifyingKey;

use super::recovery::address_from_verifying_key;
use crate::device::{HsmError, HsmResult};

/// Curve of keys the core knows how to recover signatures for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCurve {
    Secp256k1,
}

/// A labeled HSM key and the address it controls. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReference {
    label: String,
    address: Address,
    curve: KeyCurve,
}

impl KeyReference {
    /// Build from the `CKA_EC_POINT` bytes returned by the device.
    ///
    /// Accepts a bare SEC1 point or the DER `OCTET STRING` wrapping
    /// (`04 41 04 || x || y`) that PKCS#11 tokens usually return.
    pub fn from_ec_point(label: &str, ec_point: &[u8]) -> HsmResult<Self> {
        let sec1 = match ec_point {
            [0x04, 0x41, rest @ ..] if rest.len() == 0x41 => rest,
            _ => ec_point,
        };
        let key = VerifyingKey::from_sec1_bytes(sec1).map_err(|e| HsmError::InvalidPublicKey {
            label: label.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            label: label.to_string(),
            address: address_from_verifying_key(&key),
            curve: KeyCurve::Secp256k1,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn curve(&self) -> KeyCurve {
        self.curve
    }

    /// EIP-55 checksummed address
    pub fn checksum_address(&self) -> String {
        to_checksum(&self.address, None)
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.checksum_address())
    }
}
