//! Registration API trait definition
//!
//! The orchestrator only needs two exchange calls. Keeping them behind a
//! trait lets tests drive the state machine with an in-memory exchange.

use async_trait::async_trait;

use super::apex::types::{NonceRequest, NonceResponse, RegisterUserRequest};
use super::errors::RegistrationResult;

#[async_trait]
pub trait RegistrationApi: Send + Sync {
    /// Request a single-use registration nonce for a STARK key / address pair
    async fn generate_nonce(&self, request: &NonceRequest) -> RegistrationResult<NonceResponse>;

    /// Submit the registration.
    ///
    /// Returns the raw response body; the orchestrator decides whether it
    /// carries the expected `data` envelope.
    async fn register_user(
        &self,
        request: &RegisterUserRequest,
        onboarding_signature: &str,
    ) -> RegistrationResult<serde_json::Value>;
}
