//! Typed signatures
//!
//! A typed signature is the 65-byte Ethereum signature `r || s || v` with one
//! trailing byte naming the hashing convention that produced the signed
//! digest. The exchange verifies it by re-applying that convention.

use std::fmt;

use ethers::types::{Address, RecoveryMessage, Signature, H256, U256};
use ethers::utils::hash_message;

use super::errors::{SignerError, SignerResult};

/// Hashing convention of the signed digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignatureType {
    /// The raw EIP-712 digest was signed
    NoPrepend = 0x00,
    /// The digest was wrapped in the EIP-191 personal-message prefix
    Personal = 0x03,
}

impl SignatureType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(SignatureType::NoPrepend),
            0x03 => Some(SignatureType::Personal),
            _ => None,
        }
    }
}

/// 65-byte Ethereum signature plus its `SignatureType` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedSignature {
    signature: Signature,
    signature_type: SignatureType,
}

impl TypedSignature {
    /// Wrap an Ethereum signature. A raw recovery id `v ∈ {0, 1}` is
    /// normalized to `{27, 28}`.
    pub fn new(mut signature: Signature, signature_type: SignatureType) -> Self {
        if signature.v < 27 {
            signature.v += 27;
        }
        Self {
            signature,
            signature_type,
        }
    }

    /// Parse the 65-byte `r || s || v` form returned by wallets
    pub fn from_rsv(bytes: &[u8], signature_type: SignatureType) -> SignerResult<Self> {
        if bytes.len() != 65 {
            return Err(SignerError::Wallet(format!(
                "expected a 65-byte signature, got {} bytes",
                bytes.len()
            )));
        }
        let signature = Signature {
            r: U256::from_big_endian(&bytes[..32]),
            s: U256::from_big_endian(&bytes[32..64]),
            v: bytes[64] as u64,
        };
        Ok(Self::new(signature, signature_type))
    }

    /// Parse the 66-byte tagged form (`0x` prefix optional)
    pub fn from_hex(text: &str) -> SignerResult<Self> {
        let bytes = hex::decode(text.trim_start_matches("0x"))
            .map_err(|e| SignerError::Wallet(format!("invalid typed signature hex: {}", e)))?;
        let (tag, rsv) = bytes
            .split_last()
            .ok_or_else(|| SignerError::Wallet("empty typed signature".to_string()))?;
        let signature_type = SignatureType::from_byte(*tag).ok_or_else(|| {
            SignerError::Wallet(format!("unknown signature type byte 0x{:02x}", tag))
        })?;
        Self::from_rsv(rsv, signature_type)
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn signature_type(&self) -> SignatureType {
        self.signature_type
    }

    /// `r || s || v || type`
    pub fn to_bytes(&self) -> [u8; 66] {
        let mut out = [0u8; 66];
        self.signature.r.to_big_endian(&mut out[..32]);
        self.signature.s.to_big_endian(&mut out[32..64]);
        out[64] = self.signature.v as u8;
        out[65] = self.signature_type as u8;
        out
    }

    /// `0x` + 132 lowercase hex characters
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Address that produced this signature over the unprefixed digest
    /// `message_hash`, applying the personal prefix when the tag says so.
    pub fn recover_signer(&self, message_hash: H256) -> SignerResult<Address> {
        let digest = match self.signature_type {
            SignatureType::NoPrepend => message_hash,
            SignatureType::Personal => hash_message(message_hash.as_bytes()),
        };
        self.signature
            .recover(RecoveryMessage::Hash(digest))
            .map_err(|e| SignerError::Wallet(format!("signature does not recover: {}", e)))
    }
}

impl fmt::Display for TypedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
