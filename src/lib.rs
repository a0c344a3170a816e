#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Foreign Callback
//!
//! One-time registration of the foreign callback through which a native
//! execution engine escalates work back into higher-level orchestration logic.
//!
//! ## Overview
//!
//! At process initialization a single handler is installed in two places:
//!
//! - the **delegation slot** ([`ExecutionContext`]) that interpreter-side code
//!   reads when it needs to escalate an operation, and
//! - the **native bridge** ([`NativeCallbackBridge`]) that retains the handler
//!   and invokes it on the engine's schedule.
//!
//! Registration happens at most once. A second attempt fails with
//! [`CallbackError::DoubleRegistration`] and leaves the installed handler in
//! place.
//!
//! ## Module Organization
//!
//! - [`callback`] - Handler capability, event types and the blob callback dispatcher
//! - [`context`] - Write-once delegation slot
//! - [`native`] - Register-once native bridge
//! - [`registrar`] - Installation of the handler into slot and bridge
//! - [`interpreter`] - Interpreter-side escalation through the slot
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`ffi`] - C and Python entry points
//!
//! ## Quick Start
//!
//! ```rust
//! use foreign_callback::{
//!     BlobCallbackDispatcher, CallbackEvent, CallbackHandle, CallbackRegistrar,
//!     ExecutionContext, InterpreterBridge, NativeCallbackBridge,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), foreign_callback::CallbackError> {
//! let context = ExecutionContext::new();
//! let bridge = NativeCallbackBridge::default();
//! let interpreter = InterpreterBridge::new(context.clone());
//!
//! let dispatcher = Arc::new(BlobCallbackDispatcher::new(true));
//! CallbackRegistrar::new(CallbackHandle::new(dispatcher.clone())).install(&context, &bridge)?;
//!
//! let unique_id = dispatcher.register_blob_callback(|_blob| Ok(()));
//! bridge.invoke(&CallbackEvent::RemoveForeignCallback { unique_id })?;
//! assert_eq!(dispatcher.pending_blob_callbacks(), 0);
//! assert!(interpreter.context().is_bound());
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod ffi;
pub mod interpreter;
pub mod logging;
pub mod native;
pub mod registrar;

pub use callback::{
    BlobCallbackDispatcher, BlobRef, CallbackEvent, CallbackEventKind, CallbackHandle,
    CallbackReply, DispatchStats, ForeignCallback, InterpreterDelegate,
};
pub use config::{BridgeConfig, ConfigLoader, DoubleRegistrationPolicy};
pub use context::ExecutionContext;
pub use error::{CallbackError, CallbackResult};
pub use interpreter::InterpreterBridge;
pub use native::{NativeCallbackBridge, RegistrationInfo, RegistrationOutcome, RegistrationState};
pub use registrar::{install_callback, CallbackRegistrar, InstalledCallback};
