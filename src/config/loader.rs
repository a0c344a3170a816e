//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate.
//! Sources are layered as defaults → file → environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::BridgeConfig;
use crate::constants::{DEFAULT_CONFIG_FILE, ENV_PREFIX, ENV_VAR_ENVIRONMENT};
use config::{Config, Environment, File};
use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Detect the deployment environment
///
/// Checks `FOREIGN_CALLBACK_ENV`, then `APP_ENV`, then falls back to `development`.
pub fn detect_environment() -> String {
    env::var(ENV_VAR_ENVIRONMENT)
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Builder-style loader for [`BridgeConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    env_prefix: String,
    environment: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_file: None,
            env_prefix: ENV_PREFIX.to_string(),
            environment: None,
        }
    }

    /// Load from an explicit file; the file must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Override the environment variable prefix (mainly for test isolation)
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Use an explicit environment instead of detecting it
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Build, deserialize and validate the configuration
    pub fn load(&self) -> ConfigResult<BridgeConfig> {
        let environment = self
            .environment
            .clone()
            .unwrap_or_else(detect_environment);
        let defaults = BridgeConfig {
            environment: environment.clone(),
            ..BridgeConfig::default()
        };

        let mut builder = Config::builder()
            .set_default("environment", defaults.environment.as_str())?
            .set_default(
                "double_registration_policy",
                defaults.double_registration_policy.to_string(),
            )?
            .set_default("log_format", "pretty")?
            .set_default("strict_blob_dispatch", defaults.strict_blob_dispatch)?;

        builder = match &self.config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigurationError::config_file_not_found(path.clone()));
                }
                debug!(path = %path.display(), "Loading bridge configuration file");
                builder.add_source(File::from(path.as_path()).required(true))
            }
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let config: BridgeConfig = builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            environment = %config.environment,
            policy = %config.double_registration_policy,
            strict_blob_dispatch = config.strict_blob_dispatch,
            "Bridge configuration loaded"
        );

        Ok(config)
    }
}
