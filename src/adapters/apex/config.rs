//! ApeX Configuration
//!
//! Network presets (endpoint, chain ids, fee manager) for onboarding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::constants::{DEFAULT_APEX_TOKEN, ENV_APEX_NETWORK, ENV_APEX_TOKEN};
use crate::error::ConfigError;

/// Fee manager registered as `ethMulAddress` on both networks
pub const ELIXIR_APEX_MANAGER: &str = "0xFf80F9F210c75199491bcFb086fed78AA5af87b2";

/// Deployment to onboard against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApexNetwork {
    Mainnet,
    #[default]
    Testnet,
}

impl FromStr for ApexNetwork {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(ApexNetwork::Mainnet),
            "testnet" => Ok(ApexNetwork::Testnet),
            other => Err(ConfigError::Invalid(format!(
                "unknown network '{}' (expected mainnet or testnet)",
                other
            ))),
        }
    }
}

impl fmt::Display for ApexNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApexNetwork::Mainnet => write!(f, "mainnet"),
            ApexNetwork::Testnet => write!(f, "testnet"),
        }
    }
}

/// Everything network-specific the onboarding flow needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPreset {
    /// REST base URL, without the `/api` suffix
    pub endpoint: String,
    /// Chain id used in EIP-712 domains and the nonce request
    pub network_id: u64,
    /// Optional fee manager sent as `ethMulAddress`
    pub fee_manager: Option<String>,
}

impl ApexNetwork {
    pub fn preset(&self) -> NetworkPreset {
        match self {
            ApexNetwork::Mainnet => NetworkPreset {
                endpoint: "https://pro.apex.exchange".to_string(),
                network_id: 1,
                fee_manager: Some(ELIXIR_APEX_MANAGER.to_string()),
            },
            ApexNetwork::Testnet => NetworkPreset {
                endpoint: "https://testnet.pro.apex.exchange".to_string(),
                network_id: 5,
                fee_manager: Some(ELIXIR_APEX_MANAGER.to_string()),
            },
        }
    }
}

/// Configuration for an ApeX onboarding run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApexConfig {
    pub network: ApexNetwork,
    pub preset: NetworkPreset,
    /// Collateral token registered for the account
    pub token: String,
}

impl ApexConfig {
    pub fn new(network: ApexNetwork) -> Self {
        Self {
            network,
            preset: network.preset(),
            token: DEFAULT_APEX_TOKEN.to_string(),
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let network = match std::env::var(ENV_APEX_NETWORK) {
            Ok(value) => value.parse()?,
            Err(_) => ApexNetwork::default(),
        };
        let mut config = Self::new(network);
        if let Ok(token) = std::env::var(ENV_APEX_TOKEN) {
            config.token = token;
        }
        Ok(config)
    }

    /// Point the client at another base URL (tests, proxies)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.preset.endpoint = endpoint.into();
        self
    }
}

impl Default for ApexConfig {
    fn default() -> Self {
        Self::new(ApexNetwork::default())
    }
}
