//! Centralized logging configuration for hsm_onboard
//!
//! Structured logging on `tracing`:
//! - JSON output by default, pretty output with `LOG_FORMAT=pretty`
//! - level filter from `RUST_LOG`
//! - everything goes to stderr; stdout carries only the onboarding artifact
//! - redaction helpers for PINs, keys and signatures
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | `hsm_onboard=info` | Log level filter |
//! | `LOG_FORMAT` | `json` | `json` or `pretty` |
//!
//! ```rust,ignore
//! use hsm_onboard::core::logging::{init_logging, SanitizedValue};
//!
//! init_logging();
//! tracing::info!(pin = %SanitizedValue::new(&pin), "[HSM] opening session");
//! ```

use std::env;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt as ts_fmt, prelude::*, EnvFilter};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default log level when RUST_LOG is not set
pub const DEFAULT_LOG_LEVEL: &str = "hsm_onboard=info";

/// Field names that must never be logged in clear.
///
/// Wrap such values in `SanitizedValue`, or `skip(...)` them in
/// `#[instrument]`.
pub const SENSITIVE_FIELD_PATTERNS: &[&str] = &[
    "pin",
    "private_key",
    "secret",
    "passphrase",
    "signature",
    "api_key",
];

/// Redacting wrapper for sensitive strings.
///
/// Values longer than 8 characters keep their first 4; shorter ones are
/// fully redacted.
#[derive(Clone)]
pub struct SanitizedValue<'a>(&'a str);

impl<'a> SanitizedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self(value)
    }

    /// The clear value. Never log it.
    pub fn expose(&self) -> &str {
        self.0
    }
}

impl<'a> fmt::Display for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() > 8 && self.0.is_char_boundary(4) {
            write!(f, "{}...REDACTED", &self.0[..4])
        } else {
            write!(f, "REDACTED")
        }
    }
}

impl<'a> fmt::Debug for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SanitizedValue(***)")
    }
}

pub fn sanitize(value: &str) -> SanitizedValue<'_> {
    SanitizedValue::new(value)
}

/// Keep the first 8 characters of a hex signature
pub fn sanitize_signature(sig: &str) -> String {
    if sig.len() > 12 && sig.is_char_boundary(8) {
        format!("{}...", &sig[..8])
    } else {
        "REDACTED".to_string()
    }
}

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level_filter: String,
    pub use_pretty_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_filter: DEFAULT_LOG_LEVEL.to_string(),
            use_pretty_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let level_filter = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        let use_pretty_format = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("pretty"))
            .unwrap_or(false);
        Self {
            level_filter,
            use_pretty_format,
        }
    }
}

/// Initialize logging from the environment. Later calls are no-ops.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::from_env());
}

pub fn init_logging_with_config(config: LoggingConfig) {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let env_filter = EnvFilter::try_new(&config.level_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if config.use_pretty_format {
        tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_sanitized_value_long_string() {
        let pin = "user:correct-horse";
        assert_eq!(format!("{}", SanitizedValue::new(pin)), "user...REDACTED");
    }

    #[test]
    fn test_sanitized_value_short_and_empty() {
        assert_eq!(format!("{}", SanitizedValue::new("1234")), "REDACTED");
        assert_eq!(format!("{}", SanitizedValue::new("12345678")), "REDACTED");
        assert_eq!(format!("{}", SanitizedValue::new("")), "REDACTED");
    }

    #[test]
    fn test_sanitized_value_debug_hides_everything() {
        let key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        assert_eq!(format!("{:?}", sanitize(key)), "SanitizedValue(***)");
        assert_eq!(sanitize(key).expose(), key);
    }

    #[test]
    fn test_sanitize_signature() {
        let sig = format!("0x{}", "ab".repeat(66));
        assert_eq!(sanitize_signature(&sig), "0xababab...");
        assert_eq!(sanitize_signature("0x12"), "REDACTED");
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        assert_eq!(format!("{}", SanitizedValue::new("ééééééééé")), "éé...REDACTED");
        assert_eq!(sanitize_signature("€€€€€€€€€€€€€"), "REDACTED");
    }

    #[test]
    fn test_sensitive_patterns() {
        assert!(SENSITIVE_FIELD_PATTERNS.contains(&"pin"));
        assert!(SENSITIVE_FIELD_PATTERNS.contains(&"passphrase"));
    }

    #[test]
    #[serial(env)]
    fn test_logging_config_from_env() {
        std::env::set_var("LOG_FORMAT", "Pretty");
        std::env::set_var("RUST_LOG", "hsm_onboard=debug");
        let config = LoggingConfig::from_env();
        assert!(config.use_pretty_format);
        assert_eq!(config.level_filter, "hsm_onboard=debug");
        std::env::remove_var("LOG_FORMAT");
        std::env::remove_var("RUST_LOG");

        let config = LoggingConfig::from_env();
        assert!(!config.use_pretty_format);
        assert_eq!(config.level_filter, DEFAULT_LOG_LEVEL);
    }
}
