//! Core module - HSM session, signature recovery, STARK keys, onboarding
//!
//! This module uses explicit re-exports instead of glob exports so the
//! public API stays visible in one place.
//!
//! ```ignore
//! use crate::core::{HsmSession, Orchestrator, StarkKeyPair};
//! ```

pub mod key_ref;
pub mod logging;
pub mod onboarding;
pub mod recovery;
pub mod session;
pub mod stark;

// Explicit re-exports for session module
pub use session::{HsmSession, SessionState};

// Explicit re-exports for key_ref module
pub use key_ref::{KeyCurve, KeyReference};

// Explicit re-exports for recovery module
pub use recovery::{
    address_from_verifying_key, recover_signature, secp256k1_order, RawSignature,
    RecoverableSignature, SignatureRecoveryError, VOffset,
};

// Explicit re-exports for stark module
pub use stark::{StarkKeyError, StarkKeyPair};

// Explicit re-exports for onboarding module
pub use onboarding::{
    derive_stark_key, key_derivation_payload, onboard_labels, onboarding_payload,
    registered_outputs, OnboardingOutcome, OnboardingOutput, OnboardingRequest, OnboardingState,
    Orchestrator, RegistrationSession, ONLY_SIGN_ON,
};

// Explicit re-exports for logging module
pub use logging::{
    init_logging, init_logging_with_config, sanitize, sanitize_signature, LoggingConfig,
    SanitizedValue, DEFAULT_LOG_LEVEL, SENSITIVE_FIELD_PATTERNS,
};
