//! Configuration types for onboarding runs
//!
//! An `OnboardConfig` comes from an optional YAML file overlaid with
//! environment variables. Secrets (PIN, private keys) are accepted from the
//! file for dry runs but are never serialized back or printed by `Debug`.

use std::fmt;
use std::path::PathBuf;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_APEX_TOKEN, DEFAULT_HSM_LIB_PATH, ENV_APEX_NETWORK, ENV_APEX_TOKEN,
    ENV_ETH_PRIVATE_KEY, ENV_HSM_LABELS, ENV_HSM_LIB_PATH, ENV_HSM_PIN, ENV_STARK_PRIVATE_KEY,
    ENV_WALLET_ACCOUNT, ENV_WALLET_RPC_URL,
};
use crate::adapters::apex::{ApexConfig, ApexNetwork};
use crate::error::ConfigError;

fn default_library_path() -> String {
    DEFAULT_HSM_LIB_PATH.to_string()
}

fn default_token() -> String {
    DEFAULT_APEX_TOKEN.to_string()
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "***")
}

fn is_hex_key(value: &str) -> bool {
    let digits = value.trim().trim_start_matches("0x");
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// Sections
// ============================================================================

/// HSM section
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HsmConfig {
    /// Crypto-user PIN; prefer `HSM_PIN`
    #[serde(default, skip_serializing)]
    pub pin: Option<String>,
    #[serde(default = "default_library_path")]
    pub library_path: String,
    /// Key labels to onboard, one account each
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Default for HsmConfig {
    fn default() -> Self {
        Self {
            pin: None,
            library_path: default_library_path(),
            labels: Vec::new(),
        }
    }
}

impl fmt::Debug for HsmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HsmConfig")
            .field("pin", &redacted(&self.pin))
            .field("library_path", &self.library_path)
            .field("labels", &self.labels)
            .finish()
    }
}

/// Externally hosted wallet section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub account: Option<String>,
}

/// Signing method resolved from the configuration
#[derive(Clone, PartialEq, Eq)]
pub enum SigningMethod {
    Hsm {
        pin: String,
        library_path: PathBuf,
        labels: Vec<String>,
    },
    LocalKey {
        private_key: String,
    },
    Wallet {
        rpc_url: String,
        account: Option<Address>,
    },
}

impl fmt::Debug for SigningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningMethod::Hsm { library_path, labels, .. } => f
                .debug_struct("Hsm")
                .field("pin", &"***")
                .field("library_path", library_path)
                .field("labels", labels)
                .finish(),
            SigningMethod::LocalKey { .. } => {
                f.debug_struct("LocalKey").field("private_key", &"***").finish()
            }
            SigningMethod::Wallet { rpc_url, account } => f
                .debug_struct("Wallet")
                .field("rpc_url", rpc_url)
                .field("account", account)
                .finish(),
        }
    }
}

// ============================================================================
// Root configuration
// ============================================================================

/// Root configuration of an onboarding run
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnboardConfig {
    #[serde(default)]
    pub network: ApexNetwork,
    #[serde(default = "default_token")]
    pub token: String,
    /// Override of the network preset's REST endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing)]
    pub stark_private_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub eth_private_key: Option<String>,
    #[serde(default)]
    pub hsm: Option<HsmConfig>,
    #[serde(default)]
    pub wallet: Option<WalletConfig>,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            network: ApexNetwork::default(),
            token: default_token(),
            endpoint: None,
            stark_private_key: None,
            eth_private_key: None,
            hsm: None,
            wallet: None,
        }
    }
}

impl fmt::Debug for OnboardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnboardConfig")
            .field("network", &self.network)
            .field("token", &self.token)
            .field("endpoint", &self.endpoint)
            .field("stark_private_key", &redacted(&self.stark_private_key))
            .field("eth_private_key", &redacted(&self.eth_private_key))
            .field("hsm", &self.hsm)
            .field("wallet", &self.wallet)
            .finish()
    }
}

impl OnboardConfig {
    /// Configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overlay set environment variables on top of file values
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(network) = var(ENV_APEX_NETWORK) {
            self.network = network.parse()?;
        }
        if let Some(token) = var(ENV_APEX_TOKEN) {
            self.token = token;
        }
        if let Some(key) = var(ENV_STARK_PRIVATE_KEY) {
            self.stark_private_key = Some(key);
        }
        if let Some(key) = var(ENV_ETH_PRIVATE_KEY) {
            self.eth_private_key = Some(key);
        }

        let pin = var(ENV_HSM_PIN);
        let library_path = var(ENV_HSM_LIB_PATH);
        let labels = var(ENV_HSM_LABELS);
        if pin.is_some() || library_path.is_some() || labels.is_some() {
            let hsm = self.hsm.get_or_insert_with(HsmConfig::default);
            if pin.is_some() {
                hsm.pin = pin;
            }
            if let Some(path) = library_path {
                hsm.library_path = path;
            }
            if let Some(labels) = labels {
                hsm.labels = labels
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        if let Some(rpc_url) = var(ENV_WALLET_RPC_URL) {
            let account = var(ENV_WALLET_ACCOUNT)
                .or_else(|| self.wallet.as_ref().and_then(|w| w.account.clone()));
            self.wallet = Some(WalletConfig { rpc_url, account });
        }
        Ok(())
    }

    /// Validate configuration rules
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid("token cannot be empty".to_string()));
        }

        if let Some(hsm) = &self.hsm {
            if hsm.library_path.trim().is_empty() {
                return Err(ConfigError::Invalid("hsm.library_path cannot be empty".to_string()));
            }
            let mut seen = std::collections::HashSet::new();
            for label in &hsm.labels {
                if label.trim().is_empty() {
                    return Err(ConfigError::Invalid("hsm.labels contains an empty label".to_string()));
                }
                if !seen.insert(label) {
                    return Err(ConfigError::Invalid(format!("duplicate HSM label '{}'", label)));
                }
            }
            // One STARK key cannot back several accounts
            if hsm.labels.len() > 1 && self.stark_private_key.is_some() {
                return Err(ConfigError::Invalid(
                    "stark_private_key cannot be combined with several HSM labels".to_string(),
                ));
            }
        }

        if let Some(key) = &self.eth_private_key {
            if !is_hex_key(key) {
                return Err(ConfigError::Invalid("eth_private_key must be hex".to_string()));
            }
        }
        if let Some(key) = &self.stark_private_key {
            if !is_hex_key(key) {
                return Err(ConfigError::Invalid("stark_private_key must be hex".to_string()));
            }
        }

        if let Some(wallet) = &self.wallet {
            if wallet.rpc_url.trim().is_empty() {
                return Err(ConfigError::Invalid("wallet.rpc_url cannot be empty".to_string()));
            }
            if let Some(account) = &wallet.account {
                account.parse::<Address>().map_err(|_| {
                    ConfigError::Invalid(format!("wallet.account '{}' is not an address", account))
                })?;
            }
        }

        Ok(())
    }

    /// Pick the signer: HSM labels, then a plain key, then a wallet RPC
    pub fn signing_method(&self) -> Result<SigningMethod, ConfigError> {
        if let Some(hsm) = self.hsm.as_ref().filter(|h| !h.labels.is_empty()) {
            let pin = hsm
                .pin
                .clone()
                .ok_or_else(|| ConfigError::Env(format!("{} not set", ENV_HSM_PIN)))?;
            return Ok(SigningMethod::Hsm {
                pin,
                library_path: PathBuf::from(&hsm.library_path),
                labels: hsm.labels.clone(),
            });
        }

        if let Some(private_key) = &self.eth_private_key {
            return Ok(SigningMethod::LocalKey {
                private_key: private_key.clone(),
            });
        }

        if let Some(wallet) = &self.wallet {
            let account = match &wallet.account {
                Some(account) => Some(account.parse::<Address>().map_err(|_| {
                    ConfigError::Invalid(format!("wallet.account '{}' is not an address", account))
                })?),
                None => None,
            };
            return Ok(SigningMethod::Wallet {
                rpc_url: wallet.rpc_url.clone(),
                account,
            });
        }

        Err(ConfigError::NoSigningMethodProvided)
    }

    /// Exchange settings for this run
    pub fn apex_config(&self) -> ApexConfig {
        let mut config = ApexConfig::new(self.network);
        config.token = self.token.clone();
        match &self.endpoint {
            Some(endpoint) => config.with_endpoint(endpoint.clone()),
            None => config,
        }
    }
}
