//! HSM error types
//!
//! Every failure surfaced by the device binding or the session manager is
//! an `HsmError`. Session-start failures (`LoadFailed`, `SlotNotFound`,
//! `LoginFailed`) always leave the session `Closed` so a retry is clean.

use thiserror::Error;

/// Errors raised by the HSM device and the session manager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HsmError {
    /// The PKCS#11 library could not be loaded or initialized
    #[error("Failed to load PKCS#11 library '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    /// No slot with a token was found on the device
    #[error("No HSM slot found: {0}")]
    SlotNotFound(String),

    /// The device rejected the login
    #[error("HSM login failed: {0}")]
    LoginFailed(String),

    /// No key with the given label exists on the device
    #[error("Key not found: {label}")]
    KeyNotFound { label: String },

    /// Any other device-side failure during a sign/attribute call
    #[error("HSM device error: {0}")]
    DeviceError(String),

    /// The EC point returned by the device is not a secp256k1 point
    #[error("Invalid public key for '{label}': {reason}")]
    InvalidPublicKey { label: String, reason: String },

    /// A device operation was requested before `start()`
    #[error("HSM session not started")]
    NotStarted,

    /// The session was closed while the caller was waiting on it
    #[error("HSM session closed")]
    SessionClosed,
}

/// Result type alias for HSM operations
pub type HsmResult<T> = std::result::Result<T, HsmError>;
