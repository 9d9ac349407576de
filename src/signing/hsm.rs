//! HSM-backed signer
//!
//! The device returns a bare `(r, s)`; the signer folds it to low-s and
//! resolves the recovery id against the address of its bound key.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, H256};

use super::errors::SignerResult;
use super::types::{SignatureType, TypedSignature};
use super::{check_signer_address, EthSigner, SignRequest};
use crate::core::key_ref::KeyReference;
use crate::core::recovery::{recover_signature, RecoverableSignature, VOffset};
use crate::core::session::HsmSession;
use crate::device::HsmDevice;

/// Signer bound to one labeled key on a shared HSM session
pub struct HsmSigner<D: HsmDevice> {
    session: Arc<HsmSession<D>>,
    key: KeyReference,
}

impl<D: HsmDevice> HsmSigner<D> {
    pub fn new(session: Arc<HsmSession<D>>, key: KeyReference) -> Self {
        Self { session, key }
    }

    /// Resolve `label` on a started session and bind to it
    pub async fn connect(session: Arc<HsmSession<D>>, label: &str) -> SignerResult<Self> {
        let key = session.key_reference(label).await?;
        Ok(Self::new(session, key))
    }

    pub fn key(&self) -> &KeyReference {
        &self.key
    }

    /// Device signature over `hash`, canonicalized and made recoverable
    pub async fn sign_digest(&self, hash: H256) -> SignerResult<RecoverableSignature> {
        let raw = self.session.sign(self.key.label(), hash.0).await?;
        let recovered = recover_signature(&hash.0, &raw, self.key.address())?;
        tracing::debug!(
            label = %self.key.label(),
            recovery_id = recovered.recovery_id,
            "[HSM] signature recovered"
        );
        Ok(recovered)
    }

    async fn sign_tagged(
        &self,
        request: &SignRequest<'_>,
        signature_type: SignatureType,
    ) -> SignerResult<TypedSignature> {
        check_signer_address(request.signer_address, self.key.address())?;
        let recovered = self.sign_digest(request.message_hash).await?;
        Ok(TypedSignature::new(
            recovered.to_signature(VOffset::Legacy),
            signature_type,
        ))
    }
}

#[async_trait]
impl<D: HsmDevice> EthSigner for HsmSigner<D> {
    fn address(&self) -> Option<Address> {
        Some(self.key.address())
    }

    async fn sign(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        self.sign_tagged(request, SignatureType::NoPrepend).await
    }

    async fn sign_personal(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        self.sign_tagged(request, SignatureType::Personal).await
    }
}
