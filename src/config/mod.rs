//! Configuration for onboarding runs
//!
//! - Configuration types (`OnboardConfig`, `HsmConfig`, `WalletConfig`)
//! - Signing method selection (`SigningMethod`)
//! - YAML loading with environment overrides (`load_onboard_config`)
//! - Constants with environment variable overrides

pub mod constants;
mod loader;
mod types;

pub use types::{HsmConfig, OnboardConfig, SigningMethod, WalletConfig};

pub use loader::{load_config, load_config_from_str, load_onboard_config};
