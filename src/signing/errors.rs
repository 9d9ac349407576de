//! Signer error types

use ethers::types::Address;
use thiserror::Error;

use crate::core::recovery::SignatureRecoveryError;
use crate::device::HsmError;

/// Errors raised by any `EthSigner` variant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// An explicit signer address was requested that the key does not control
    #[error("Signer address is {requested:?} but the Ethereum key controls {actual:?}")]
    AddressMismatch { requested: Address, actual: Address },

    #[error("HSM error: {0}")]
    Hsm(#[from] HsmError),

    #[error("Signature recovery error: {0}")]
    Recovery(#[from] SignatureRecoveryError),

    /// Key parsing, wallet RPC or payload encoding failure
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Wallet-hosted signers hash the structured message themselves
    #[error("Wallet-hosted signer requires an EIP-712 structured message")]
    MissingTypedData,

    #[error("No signer address: pass one explicitly or configure a default wallet account")]
    NoSignerAddress,
}

/// Result type alias for signer operations
pub type SignerResult<T> = std::result::Result<T, SignerError>;
