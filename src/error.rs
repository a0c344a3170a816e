//! # Callback Error Types
//!
//! Structured error handling for callback registration and dispatch using
//! thiserror instead of stringly-typed errors.

use thiserror::Error;
use uuid::Uuid;

use crate::callback::types::CallbackEventKind;
use crate::config::ConfigurationError;

/// Errors raised while registering or invoking the foreign callback
#[derive(Error, Debug)]
pub enum CallbackError {
    /// The one-time registration invariant was violated
    #[error(
        "Foreign callback may only be registered once per process: '{installed_name}' ({installed_id}) is already registered, rejected '{rejected_name}'"
    )]
    DoubleRegistration {
        installed_id: Uuid,
        installed_name: String,
        rejected_name: String,
    },

    #[error("No foreign callback installed; cannot dispatch {kind} event")]
    NoHandlerInstalled { kind: CallbackEventKind },

    #[error("No blob callback registered for unique_id {unique_id}")]
    UnknownBlobCallback { unique_id: i64 },

    #[error("No interpreter delegate available to handle {kind} event")]
    DelegateUnavailable { kind: CallbackEventKind },

    #[error("Unexpected reply for {kind} event: expected {expected}")]
    UnexpectedReply {
        kind: CallbackEventKind,
        expected: &'static str,
    },

    #[error("Handler '{handler}' failed: {message}")]
    HandlerFailed { handler: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl CallbackError {
    /// Convenience constructor used by handler implementations
    pub fn handler_failed(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFailed {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports a violation of the at-most-once invariant
    pub fn is_double_registration(&self) -> bool {
        matches!(self, Self::DoubleRegistration { .. })
    }
}

/// Result type for callback operations
pub type CallbackResult<T> = Result<T, CallbackError>;
