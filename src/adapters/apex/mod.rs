//! ApeX exchange adapter
//!
//! REST client for the two onboarding calls (nonce, registration) plus the
//! network presets they depend on.

pub mod client;
pub mod config;
pub mod types;

pub use client::ApexClient;
pub use config::{ApexConfig, ApexNetwork, NetworkPreset, ELIXIR_APEX_MANAGER};
pub use types::{
    AccountInfo, ApiCredentials, ApiEnvelope, NonceRequest, NonceResponse, RegisterUserRequest,
    RegistrationData,
};
