//! Externally hosted wallet signer
//!
//! The wallet (a node or browser-extension RPC) owns the key and hashes the
//! EIP-712 message itself via `eth_signTypedData_v4`. Precomputed hashes are
//! never sent to it.

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Bytes};

use super::errors::{SignerError, SignerResult};
use super::types::{SignatureType, TypedSignature};
use super::{EthSigner, SignRequest};

/// Account-holding wallet reachable over some transport
#[async_trait]
pub trait ExternalWallet: Send + Sync {
    /// Account to sign with when the request names none
    fn default_account(&self) -> Option<Address>;

    /// 65-byte `r || s || v` signature of `data` by `account`
    async fn sign_typed_data(&self, account: Address, data: &TypedData) -> SignerResult<Vec<u8>>;
}

/// `ExternalWallet` over an Ethereum JSON-RPC endpoint
#[derive(Debug, Clone)]
pub struct JsonRpcWallet {
    provider: Provider<Http>,
    default_account: Option<Address>,
}

impl JsonRpcWallet {
    pub fn new(rpc_url: &str, default_account: Option<Address>) -> SignerResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| SignerError::Wallet(format!("invalid RPC url '{}': {}", rpc_url, e)))?;
        Ok(Self {
            provider,
            default_account,
        })
    }
}

#[async_trait]
impl ExternalWallet for JsonRpcWallet {
    fn default_account(&self) -> Option<Address> {
        self.default_account
    }

    async fn sign_typed_data(&self, account: Address, data: &TypedData) -> SignerResult<Vec<u8>> {
        let signature: Bytes = self
            .provider
            .request("eth_signTypedData_v4", (account, data))
            .await
            .map_err(|e| SignerError::Wallet(format!("eth_signTypedData_v4 failed: {}", e)))?;
        Ok(signature.to_vec())
    }
}

/// Signer delegating to an `ExternalWallet`
pub struct WalletSigner {
    wallet: Box<dyn ExternalWallet>,
}

impl WalletSigner {
    pub fn new(wallet: impl ExternalWallet + 'static) -> Self {
        Self {
            wallet: Box::new(wallet),
        }
    }

    async fn sign_typed(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        let data = request.eip712.ok_or(SignerError::MissingTypedData)?;
        let account = request
            .signer_address
            .or_else(|| self.wallet.default_account())
            .ok_or(SignerError::NoSignerAddress)?;
        let raw = self.wallet.sign_typed_data(account, data).await?;
        TypedSignature::from_rsv(&raw, SignatureType::NoPrepend)
    }
}

#[async_trait]
impl EthSigner for WalletSigner {
    fn address(&self) -> Option<Address> {
        self.wallet.default_account()
    }

    async fn sign(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        self.sign_typed(request).await
    }

    /// The wallet applies its own hashing; the result is still `NoPrepend`
    async fn sign_personal(&self, request: &SignRequest<'_>) -> SignerResult<TypedSignature> {
        self.sign_typed(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::test_support::sample_typed_data;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::H256;

    /// In-process wallet that signs typed data with a local key, returning
    /// the raw recovery id the way some hardware wallets do
    struct InProcessWallet {
        key: LocalWallet,
        default_account: Option<Address>,
    }

    #[async_trait]
    impl ExternalWallet for InProcessWallet {
        fn default_account(&self) -> Option<Address> {
            self.default_account
        }

        async fn sign_typed_data(&self, account: Address, data: &TypedData) -> SignerResult<Vec<u8>> {
            assert_eq!(account, self.key.address());
            let mut sig = self
                .key
                .sign_typed_data(data)
                .await
                .map_err(|e| SignerError::Wallet(e.to_string()))?;
            sig.v -= 27;
            Ok(sig.to_vec())
        }
    }

    fn signer(with_default: bool) -> (WalletSigner, Address) {
        let key = LocalWallet::from_bytes(&[0x44u8; 32]).unwrap();
        let address = key.address();
        let wallet = InProcessWallet {
            key,
            default_account: with_default.then_some(address),
        };
        (WalletSigner::new(wallet), address)
    }

    #[tokio::test]
    async fn test_signs_structured_message_with_default_account() {
        let (signer, address) = signer(true);
        let data = sample_typed_data();
        let request = SignRequest::typed(&data).unwrap();

        let sig = signer.sign(&request).await.unwrap();
        assert_eq!(sig.signature_type(), SignatureType::NoPrepend);
        assert!(sig.signature().v >= 27);
        assert_eq!(sig.recover_signer(request.message_hash).unwrap(), address);
    }

    #[tokio::test]
    async fn test_personal_entry_point_still_no_prepend() {
        let (signer, _) = signer(true);
        let data = sample_typed_data();
        let request = SignRequest::personal(&data).unwrap();
        let sig = signer.sign_personal(&request).await.unwrap();
        assert_eq!(sig.signature_type(), SignatureType::NoPrepend);
    }

    #[tokio::test]
    async fn test_precomputed_hash_alone_is_rejected() {
        let (signer, _) = signer(true);
        let result = signer.sign(&SignRequest::hash(H256::repeat_byte(3))).await;
        assert_eq!(result, Err(SignerError::MissingTypedData));
    }

    #[tokio::test]
    async fn test_no_account_available() {
        let (signer, address) = signer(false);
        let data = sample_typed_data();
        let request = SignRequest::typed(&data).unwrap();
        assert_eq!(signer.sign(&request).await, Err(SignerError::NoSignerAddress));

        let request = request.with_signer_address(address);
        assert!(signer.sign(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_json_rpc_wallet_calls_sign_typed_data_v4() {
        let mut server = mockito::Server::new_async().await;
        let rsv = format!("0x{}1b", "11".repeat(64));
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::Regex("eth_signTypedData_v4".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"jsonrpc":"2.0","id":1,"result":"{}"}}"#, rsv))
            .create_async()
            .await;

        let account = Address::repeat_byte(0x55);
        let wallet = JsonRpcWallet::new(&server.url(), Some(account)).unwrap();
        let signer = WalletSigner::new(wallet);
        let data = sample_typed_data();
        let sig = signer.sign(&SignRequest::typed(&data).unwrap()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(sig.signature().v, 27);
        assert_eq!(sig.to_bytes()[..32], [0x11u8; 32]);
    }
}
