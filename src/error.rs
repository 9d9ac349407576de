//! Application-wide error types using thiserror
//!
//! Every layer has its own error enum; `AppError` wraps them at the binary
//! boundary so `main` can report any failure uniformly.

use thiserror::Error;

use crate::adapters::errors::RegistrationError;
use crate::core::recovery::SignatureRecoveryError;
use crate::device::HsmError;
use crate::signing::SignerError;

/// Configuration problems found before any device or network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither HSM labels, a plain key, nor a wallet RPC were configured
    #[error("No signing method provided: configure HSM labels, ETH_PRIVATE_KEY or WALLET_RPC_URL")]
    NoSigningMethodProvided,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// A required environment variable is missing or unreadable
    #[error("Environment error: {0}")]
    Env(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HSM error: {0}")]
    Hsm(#[from] HsmError),

    #[error("Signature recovery error: {0}")]
    Recovery(#[from] SignatureRecoveryError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
