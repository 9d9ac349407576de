//! Application-wide constants and configuration defaults
//!
//! This module centralizes all hardcoded values to make them configurable
//! and maintainable. Values can be overridden via environment variables.

use std::time::Duration;

// =============================================================================
// Environment variable names
// =============================================================================

/// HSM crypto-user PIN
pub const ENV_HSM_PIN: &str = "HSM_PIN";
/// Path of the vendor PKCS#11 library
pub const ENV_HSM_LIB_PATH: &str = "HSM_LIB_PATH";
/// Comma-separated HSM key labels to onboard
pub const ENV_HSM_LABELS: &str = "HSM_LABELS";
/// Plain Ethereum private key (hex)
pub const ENV_ETH_PRIVATE_KEY: &str = "ETH_PRIVATE_KEY";
/// JSON-RPC endpoint of an externally hosted wallet
pub const ENV_WALLET_RPC_URL: &str = "WALLET_RPC_URL";
/// Default account of the external wallet
pub const ENV_WALLET_ACCOUNT: &str = "WALLET_ACCOUNT";
/// Pre-computed STARK private key (hex)
pub const ENV_STARK_PRIVATE_KEY: &str = "STARK_PRIVATE_KEY";
/// `mainnet` or `testnet`
pub const ENV_APEX_NETWORK: &str = "APEX_NETWORK";
/// Collateral token to register
pub const ENV_APEX_TOKEN: &str = "APEX_TOKEN";
/// Optional YAML config file
pub const ENV_ONBOARD_CONFIG: &str = "ONBOARD_CONFIG";

// =============================================================================
// Defaults
// =============================================================================

/// CloudHSM client library location
pub const DEFAULT_HSM_LIB_PATH: &str = "/opt/cloudhsm/lib/libcloudhsm_pkcs11.so";

/// Collateral token registered when none is configured
pub const DEFAULT_APEX_TOKEN: &str = "USDC";

/// Prefix of HSM labels in the batch keygen naming scheme
pub const HSM_LABEL_PREFIX: &str = "ElixirMainnetPrivateKey_APEX_";

// =============================================================================
// HTTP Configuration
// =============================================================================

/// Whole-request timeout for exchange REST calls (default: 10000ms)
///
/// Environment variable: `HTTP_TIMEOUT_MS`
pub fn http_timeout() -> Duration {
    let ms = std::env::var("HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);
    Duration::from_millis(ms)
}

/// TCP connect timeout for exchange REST calls (default: 3000ms)
///
/// Environment variable: `HTTP_CONNECT_TIMEOUT_MS`
pub fn http_connect_timeout() -> Duration {
    let ms = std::env::var("HTTP_CONNECT_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3_000);
    Duration::from_millis(ms)
}

// =============================================================================
// HSM Configuration
// =============================================================================

/// Maximum time to wait for the HSM session to become ready (default: 30s)
///
/// Environment variable: `HSM_READY_TIMEOUT_SECS`
pub fn hsm_ready_timeout() -> Duration {
    let secs = std::env::var("HSM_READY_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    Duration::from_secs(secs)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for debugging/startup logs)
pub fn log_configuration() {
    tracing::info!("=== Onboarding Configuration ===");
    tracing::info!("HTTP:");
    tracing::info!("  - Request timeout: {:?}", http_timeout());
    tracing::info!("  - Connect timeout: {:?}", http_connect_timeout());
    tracing::info!("HSM:");
    tracing::info!("  - Ready timeout: {:?}", hsm_ready_timeout());
    tracing::info!("================================");
}
