//! # Bridge Constants
//!
//! Environment variable names and well-known identifiers shared by the
//! configuration, logging and FFI layers.

/// Prefix for configuration environment variables (`FOREIGN_CALLBACK_*`)
pub const ENV_PREFIX: &str = "FOREIGN_CALLBACK";

/// Environment selector, checked before `APP_ENV`
pub const ENV_VAR_ENVIRONMENT: &str = "FOREIGN_CALLBACK_ENV";

/// Switches console logging to JSON when set to `json`
pub const ENV_VAR_LOG_FORMAT: &str = "FOREIGN_CALLBACK_LOG_FORMAT";

/// Config file searched when no explicit path is given (extension optional)
pub const DEFAULT_CONFIG_FILE: &str = "config/foreign_callback";

/// Name given to handlers registered without an explicit name
pub const ANONYMOUS_HANDLER_NAME: &str = "anonymous";

/// Name of the standard blob callback dispatcher
pub const GLOBAL_DISPATCHER_NAME: &str = "global_foreign_callback";

/// Status codes returned across the C ABI
pub mod ffi_status {
    pub const OK: i32 = 0;
    pub const ALREADY_REGISTERED: i32 = 1;
    pub const INVALID_ARGUMENT: i32 = 2;
    pub const HANDLER_ERROR: i32 = 3;
}
