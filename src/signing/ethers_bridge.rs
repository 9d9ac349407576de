//! `ethers` `Signer` over an HSM key
//!
//! Lets the HSM key drive any `ethers` middleware. Messages and typed data
//! get `v = 27 + id`; transactions get the EIP-155 `v` for their chain.

use std::fmt;

use async_trait::async_trait;
use ethers::signers::Signer;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::transaction::eip712::Eip712;
use ethers::types::{Address, Signature, H256};
use ethers::utils::hash_message;

use super::errors::{SignerError, SignerResult};
use super::hsm::HsmSigner;
use crate::core::recovery::VOffset;
use crate::device::HsmDevice;

pub struct HsmEthersSigner<D: HsmDevice> {
    inner: HsmSigner<D>,
    chain_id: u64,
}

impl<D: HsmDevice> HsmEthersSigner<D> {
    pub fn new(inner: HsmSigner<D>, chain_id: u64) -> Self {
        Self { inner, chain_id }
    }

    async fn sign_with(&self, hash: H256, offset: VOffset) -> SignerResult<Signature> {
        Ok(self.inner.sign_digest(hash).await?.to_signature(offset))
    }
}

impl<D: HsmDevice> fmt::Debug for HsmEthersSigner<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HsmEthersSigner")
            .field("key", self.inner.key())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[async_trait]
impl<D: HsmDevice> Signer for HsmEthersSigner<D> {
    type Error = SignerError;

    async fn sign_message<S: Send + Sync + AsRef<[u8]>>(
        &self,
        message: S,
    ) -> Result<Signature, Self::Error> {
        self.sign_with(hash_message(message), VOffset::Legacy).await
    }

    async fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Signature, Self::Error> {
        let chain_id = tx.chain_id().map(|id| id.as_u64()).unwrap_or(self.chain_id);
        let mut tx = tx.clone();
        tx.set_chain_id(chain_id);
        self.sign_with(tx.sighash(), VOffset::Eip155 { chain_id }).await
    }

    async fn sign_typed_data<T: Eip712 + Send + Sync>(
        &self,
        payload: &T,
    ) -> Result<Signature, Self::Error> {
        let digest = payload
            .encode_eip712()
            .map_err(|e| SignerError::Wallet(format!("EIP-712 encoding failed: {}", e)))?;
        self.sign_with(H256::from(digest), VOffset::Legacy).await
    }

    fn address(&self) -> Address {
        self.inner.key().address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn with_chain_id<T: Into<u64>>(mut self, chain_id: T) -> Self {
        self.chain_id = chain_id.into();
        self
    }
}
