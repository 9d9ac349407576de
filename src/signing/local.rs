//! Local-key signer

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;

use super::errors::{SignerError, SignerResult};
use super::types::{SignatureType, TypedSignature};
use super::{check_signer_address, EthSigner, SignRequest};

/// Signs digests with an in-memory secp256k1 key
#[derive(Debug, Clone)]
pub struct LocalKeySigner {
    wallet: LocalWallet,
}

impl LocalKeySigner {
    /// Parse a hex private key (`0x` prefix optional)
    pub fn from_hex(private_key: &str) -> SignerResult<Self> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| SignerError::Wallet(format!("invalid private key hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(secret: &[u8]) -> SignerResult<Self> {
        let wallet = LocalWallet::from_bytes(secret)
            .map_err(|e| SignerError::Wallet(format!("invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    fn sign_tagged(
        &self,
        request: &SignRequest<'_>,
        signature_type: SignatureType,
    ) -> SignerResult<TypedSignature> {
        check_signer_address(request.signer_address, self.wallet.address())?;
        let signature = self
            .wallet
            .sign_hash(request.message_hash)
            .map_err(|e| SignerError::Wallet(e.to_string()))?;
        Ok(TypedSignature::new(signature, signature_type))
    }
}

#[async_trait]
impl EthSigner for LocalKeySigner {
    fn address(&self) -> Option<Address> {
        Some(self.wallet.address())
    }

    async fn sign(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        self.sign_tagged(request, SignatureType::NoPrepend)
    }

    async fn sign_personal(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        self.sign_tagged(request, SignatureType::Personal)
    }
}
