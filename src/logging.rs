//! # Structured Logging Module
//!
//! Environment-aware structured logging for callback registration and FFI
//! dispatch. Initialisation is idempotent: the first call wins and a global
//! subscriber installed by a host runtime is tolerated.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{default_log_level, detect_environment, BridgeConfig, LogFormat};
use crate::constants::ENV_VAR_LOG_FORMAT;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging from environment variables only
///
/// Safe to call from FFI module initialisation before any configuration
/// has been loaded.
pub fn init_console_only() {
    let environment = detect_environment();
    let format = std::env::var(ENV_VAR_LOG_FORMAT)
        .ok()
        .and_then(|value| value.parse::<LogFormat>().ok())
        .unwrap_or_default();
    install_subscriber(&environment, default_log_level(&environment), format);
}

/// Initialize structured logging from a loaded [`BridgeConfig`]
pub fn init_structured_logging(config: &BridgeConfig) {
    install_subscriber(
        &config.environment,
        &config.effective_log_level(),
        config.log_format,
    );
}

fn install_subscriber(environment: &str, log_level: &str, format: LogFormat) {
    TRACING_INITIALIZED.get_or_init(|| {
        // RUST_LOG takes precedence over the environment default
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let layer = match format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                pid = std::process::id(),
                "Structured logging initialized"
            );
        }
    });
}

/// Log registration lifecycle events with a unified field layout
#[macro_export]
macro_rules! log_registration {
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "REGISTRATION_{}", $operation
        );
    };
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "REGISTRATION_{}", $operation
        );
    };
}

/// Log FFI boundary crossings
#[macro_export]
macro_rules! log_ffi {
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "FFI_{}", $operation
        );
    };
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "FFI_{}", $operation
        );
    };
}
