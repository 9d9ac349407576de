//! Signer factory for runtime selection
//!
//! Enum-based dispatch over the signer variants (no `Box<dyn>`), built from
//! the resolved `SigningMethod` of the configuration.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;

use super::errors::SignerResult;
use super::hsm::HsmSigner;
use super::local::LocalKeySigner;
use super::types::TypedSignature;
use super::wallet::{JsonRpcWallet, WalletSigner};
use super::{EthSigner, SignRequest};
use crate::core::session::HsmSession;
use crate::device::HsmDevice;

/// Any supported signer
pub enum AnySigner<D: HsmDevice> {
    Hsm(HsmSigner<D>),
    LocalKey(LocalKeySigner),
    Wallet(WalletSigner),
}

macro_rules! delegate {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnySigner::Hsm(s) => s.$method($($arg),*),
            AnySigner::LocalKey(s) => s.$method($($arg),*),
            AnySigner::Wallet(s) => s.$method($($arg),*),
        }
    };
    (await $self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnySigner::Hsm(s) => s.$method($($arg),*).await,
            AnySigner::LocalKey(s) => s.$method($($arg),*).await,
            AnySigner::Wallet(s) => s.$method($($arg),*).await,
        }
    };
}

impl<D: HsmDevice> AnySigner<D> {
    /// Bind an HSM signer to `label` on a started session
    pub async fn hsm(session: Arc<HsmSession<D>>, label: &str) -> SignerResult<Self> {
        Ok(AnySigner::Hsm(HsmSigner::connect(session, label).await?))
    }

    pub fn local_key(private_key: &str) -> SignerResult<Self> {
        Ok(AnySigner::LocalKey(LocalKeySigner::from_hex(private_key)?))
    }

    /// Wallet reachable over Ethereum JSON-RPC
    pub fn json_rpc_wallet(rpc_url: &str, account: Option<Address>) -> SignerResult<Self> {
        let wallet = JsonRpcWallet::new(rpc_url, account)?;
        Ok(AnySigner::Wallet(WalletSigner::new(wallet)))
    }

    /// Short variant name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AnySigner::Hsm(_) => "hsm",
            AnySigner::LocalKey(_) => "local_key",
            AnySigner::Wallet(_) => "wallet",
        }
    }
}

#[async_trait]
impl<D: HsmDevice> EthSigner for AnySigner<D> {
    fn address(&self) -> Option<Address> {
        delegate!(self, address())
    }

    async fn sign(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        delegate!(await self, sign(request))
    }

    async fn sign_personal(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        delegate!(await self, sign_personal(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDevice;
    use crate::signing::SignatureType;
    use ethers::types::H256;

    #[tokio::test]
    async fn test_dispatch_to_local_key() {
        let signer: AnySigner<SimulatedDevice> = AnySigner::local_key(&"11".repeat(32)).unwrap();
        assert_eq!(signer.kind(), "local_key");
        let sig = signer
            .sign_personal(&SignRequest::hash(H256::repeat_byte(9)))
            .await
            .unwrap();
        assert_eq!(sig.signature_type(), SignatureType::Personal);
    }

    #[tokio::test]
    async fn test_dispatch_to_hsm() {
        let device = SimulatedDevice::new("pin").with_random_key("k");
        let session = Arc::new(HsmSession::new(device));
        session.start("pin", "lib.so").await.unwrap();
        let signer = AnySigner::hsm(Arc::clone(&session), "k").await.unwrap();
        assert_eq!(signer.kind(), "hsm");

        let request = SignRequest::hash(H256::repeat_byte(9));
        let sig = signer.sign(&request).await.unwrap();
        assert_eq!(sig.recover_signer(request.message_hash).ok(), signer.address());
    }

    #[test]
    fn test_json_rpc_wallet() {
        let account: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        let signer: AnySigner<SimulatedDevice> =
            AnySigner::json_rpc_wallet("http://127.0.0.1:8545", Some(account)).unwrap();
        assert_eq!(signer.kind(), "wallet");
        assert_eq!(signer.address(), Some(account));
        assert!(AnySigner::<SimulatedDevice>::json_rpc_wallet("not a url", None).is_err());
    }

    #[tokio::test]
    async fn test_hsm_unknown_label() {
        let session = Arc::new(HsmSession::new(SimulatedDevice::new("pin")));
        session.start("pin", "lib.so").await.unwrap();
        assert!(AnySigner::hsm(session, "missing").await.is_err());
    }
}
