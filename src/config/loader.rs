//! Configuration loader for YAML files
//!
//! A YAML file is optional. When `ONBOARD_CONFIG` names one, it is parsed
//! first and environment variables are layered on top; otherwise the whole
//! configuration comes from the environment.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{AppError, ConfigError};

use super::constants::ENV_ONBOARD_CONFIG;
use super::types::OnboardConfig;

/// Load and validate configuration from a YAML file
///
/// Environment overrides are not applied here; see [`load_onboard_config`].
///
/// ```ignore
/// use std::path::Path;
/// use hsm_onboard::config::load_config;
///
/// let config = load_config(Path::new("onboard.yaml"))?;
/// ```
pub fn load_config(path: &Path) -> Result<OnboardConfig, AppError> {
    if !path.exists() {
        return Err(ConfigError::Invalid(format!(
            "Configuration file not found: {}",
            path.display()
        ))
        .into());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let config: OnboardConfig = serde_yaml::from_reader(reader).map_err(|e| {
        ConfigError::Invalid(format!("YAML parse error in '{}': {}", path.display(), e))
    })?;

    config.validate()?;

    Ok(config)
}

/// Load configuration from a YAML string
pub fn load_config_from_str(yaml_content: &str) -> Result<OnboardConfig, AppError> {
    let config: OnboardConfig = serde_yaml::from_str(yaml_content)
        .map_err(|e| ConfigError::Invalid(format!("YAML parse error: {}", e)))?;

    config.validate()?;

    Ok(config)
}

/// Resolve the run configuration: optional file, then environment
pub fn load_onboard_config() -> Result<OnboardConfig, AppError> {
    let mut config = match std::env::var(ENV_ONBOARD_CONFIG) {
        Ok(path) if !path.trim().is_empty() => {
            tracing::info!(path = %path, "[CONFIG] Loading configuration file");
            load_config(Path::new(path.trim()))?
        }
        _ => OnboardConfig::default(),
    };

    config.apply_env_overrides()?;
    config.validate()?;

    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================
