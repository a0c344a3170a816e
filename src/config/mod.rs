//! # Bridge Configuration
//!
//! Layered configuration for the foreign callback bridge. Values come from
//! built-in defaults, an optional TOML/YAML/JSON file and `FOREIGN_CALLBACK_*`
//! environment variables, in increasing order of precedence.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use foreign_callback::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! println!("double registration policy: {}", config.double_registration_policy);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::{detect_environment, ConfigLoader};

/// What the native bridge does when asked to register a second handler
///
/// Neither policy ever replaces an installed handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DoubleRegistrationPolicy {
    /// Fail fast with `CallbackError::DoubleRegistration`
    #[default]
    Reject,
    /// Keep the first handler, log a warning and report `AlreadyRegistered`
    Ignore,
}

impl fmt::Display for DoubleRegistrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for DoubleRegistrationPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            other => Err(ConfigurationError::invalid_value(
                "double_registration_policy",
                other,
                "expected 'reject' or 'ignore'",
            )),
        }
    }
}

impl TryFrom<String> for DoubleRegistrationPolicy {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Console output format for the tracing subscriber
///
/// Parsed case-insensitively, so `FOREIGN_CALLBACK_LOG_FORMAT=JSON` is accepted
/// by both the console logger and the configuration loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigurationError::invalid_value(
                "log_format",
                other,
                "expected 'pretty' or 'json'",
            )),
        }
    }
}

impl TryFrom<String> for LogFormat {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Root configuration for the callback bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Deployment environment (development, test, production, ...)
    pub environment: String,

    /// Behaviour on a second registration attempt
    #[serde(default)]
    pub double_registration_policy: DoubleRegistrationPolicy,

    /// Explicit tracing filter; falls back to the environment default when absent
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Treat `OfBlobCall` for an unknown unique_id as an error instead of a no-op
    #[serde(default = "default_strict_blob_dispatch")]
    pub strict_blob_dispatch: bool,
}

fn default_strict_blob_dispatch() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            environment: detect_environment(),
            double_registration_policy: DoubleRegistrationPolicy::default(),
            log_level: None,
            log_format: LogFormat::default(),
            strict_blob_dispatch: default_strict_blob_dispatch(),
        }
    }
}

impl BridgeConfig {
    /// Validate loaded values that serde cannot check on its own
    pub fn validate(&self) -> ConfigResult<()> {
        if self.environment.trim().is_empty() {
            return Err(ConfigurationError::validation_error(
                "environment must not be empty",
            ));
        }

        if let Some(level) = &self.log_level {
            if level.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "log_level",
                    level.as_str(),
                    "log level filter must not be blank",
                ));
            }
        }

        Ok(())
    }

    /// Tracing filter directive for this configuration
    pub fn effective_log_level(&self) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| default_log_level(&self.environment).to_string())
    }
}

/// Default tracing filter for an environment
pub fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}
