//! Exchange adapters for onboarding
//!
//! This module provides the registration seam the orchestrator talks to
//! and its ApeX REST implementation.

pub mod apex;
pub mod errors;
pub mod traits;

use crate::config::constants::{http_connect_timeout, http_timeout};

// Re-export commonly used types for convenience
pub use apex::{ApexClient, ApexConfig, ApexNetwork, ApiCredentials, NetworkPreset};
pub use errors::{RegistrationError, RegistrationResult};
pub use traits::RegistrationApi;

/// Create the HTTP client used for exchange REST calls
pub fn create_http_client(exchange_name: &str) -> reqwest::Client {
    let timeout = http_timeout();
    let connect_timeout = http_connect_timeout();
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(
                exchange = %exchange_name,
                error = %e,
                "HTTP client builder failed, falling back to defaults without timeouts"
            );
            reqwest::Client::new()
        });
    tracing::info!(
        phase = "init",
        exchange = %exchange_name,
        timeout_ms = timeout.as_millis() as u64,
        connect_timeout_ms = connect_timeout.as_millis() as u64,
        "HTTP client configured"
    );
    client
}
