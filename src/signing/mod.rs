//! Ethereum signers
//!
//! `EthSigner` is the capability the onboarding flow signs with. Each
//! variant implements both entry points on its own:
//! - `HsmSigner` - device-held key, signature recovered against its address
//! - `LocalKeySigner` - in-memory private key
//! - `WalletSigner` - externally hosted wallet that hashes EIP-712 itself
//!
//! `AnySigner` dispatches between them at runtime and `HsmEthersSigner`
//! exposes the HSM key through the `ethers` `Signer` trait.

pub mod errors;
pub mod ethers_bridge;
pub mod factory;
pub mod hsm;
pub mod local;
pub mod types;
pub mod wallet;

use async_trait::async_trait;
use ethers::types::transaction::eip712::{Eip712, TypedData};
use ethers::types::{Address, H256};
use ethers::utils::hash_message;

pub use errors::{SignerError, SignerResult};
pub use ethers_bridge::HsmEthersSigner;
pub use factory::AnySigner;
pub use hsm::HsmSigner;
pub use local::LocalKeySigner;
pub use types::{SignatureType, TypedSignature};
pub use wallet::{ExternalWallet, JsonRpcWallet, WalletSigner};

/// Inputs shared by both signing entry points.
///
/// Hash-based signers use `message_hash`; wallet-hosted signers use
/// `eip712`. Each ignores the other field.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub eip712: Option<&'a TypedData>,
    pub message_hash: H256,
    pub signer_address: Option<Address>,
}

impl<'a> SignRequest<'a> {
    /// Request over the raw EIP-712 digest of `data`
    pub fn typed(data: &'a TypedData) -> SignerResult<Self> {
        let digest = data
            .encode_eip712()
            .map_err(|e| SignerError::Wallet(format!("EIP-712 encoding failed: {}", e)))?;
        Ok(Self {
            eip712: Some(data),
            message_hash: H256::from(digest),
            signer_address: None,
        })
    }

    /// Request over the EIP-191 personal hash of the EIP-712 digest of `data`
    pub fn personal(data: &'a TypedData) -> SignerResult<Self> {
        let mut request = Self::typed(data)?;
        request.message_hash = hash_message(request.message_hash.as_bytes());
        Ok(request)
    }

    /// Request over a precomputed hash with no structured message
    pub fn hash(message_hash: H256) -> Self {
        Self {
            eip712: None,
            message_hash,
            signer_address: None,
        }
    }

    pub fn with_signer_address(mut self, address: Address) -> Self {
        self.signer_address = Some(address);
        self
    }
}

/// Signing capability with exactly two entry points
#[async_trait]
pub trait EthSigner: Send + Sync {
    /// Address this signer signs for, when known up front
    fn address(&self) -> Option<Address>;

    /// Sign the request's digest as-is (`NoPrepend`)
    async fn sign(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature>;

    /// Sign a personally-prefixed digest (`Personal` for hash-based signers)
    async fn sign_personal(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature>;
}

/// Fail with `AddressMismatch` when `requested` names a different address
pub(crate) fn check_signer_address(requested: Option<Address>, actual: Address) -> SignerResult<()> {
    match requested {
        Some(requested) if requested != actual => {
            Err(SignerError::AddressMismatch { requested, actual })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use ethers::types::transaction::eip712::TypedData;

    /// Small EIP-712 payload shaped like the exchange's key derivation message
    pub fn sample_typed_data() -> TypedData {
        serde_json::from_value(serde_json::json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"}
                ],
                "ApeX": [
                    {"name": "action", "type": "string"},
                    {"name": "onlySignOn", "type": "string"}
                ]
            },
            "primaryType": "ApeX",
            "domain": {"name": "ApeX", "version": "1.0", "chainId": 5},
            "message": {"action": "L2 Key", "onlySignOn": "https://pro.apex.exchange"}
        }))
        .unwrap()
    }
}
