//! # FFI Surfaces
//!
//! Entry points through which host runtimes hand their foreign callback to the
//! process-wide registrar. Both surfaces install into
//! [`crate::context::ExecutionContext::global`] and
//! [`crate::native::NativeCallbackBridge::global`].

pub mod c_api;
#[cfg(feature = "python-ffi")]
pub mod python;
