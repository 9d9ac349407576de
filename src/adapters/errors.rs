//! Registration error types
//!
//! Everything that can end an onboarding attempt in `Failed` is a
//! `RegistrationError`, whether it comes from the exchange, the transport,
//! the signer or the STARK key material.

use thiserror::Error;

use crate::core::stark::StarkKeyError;
use crate::signing::SignerError;

/// Errors from the nonce/registration exchange
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// The exchange answered without the `data` envelope; `raw` is its body
    #[error("Registration response has no data field: {raw}")]
    MissingDataField { raw: serde_json::Value },

    /// Request never produced a readable response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response had a `data` envelope but not the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Invalid STARK key: {0}")]
    InvalidStarkKey(#[from] StarkKeyError),

    /// A write-once session field was written twice
    #[error("Registration session field '{0}' is already set")]
    AlreadySet(&'static str),

    /// `run()` was called on an orchestrator that already ran
    #[error("Onboarding attempt already finished; start a new one")]
    AttemptFinished,
}

/// Result type alias for registration operations
pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;
