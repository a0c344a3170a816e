//! # Execution Context
//!
//! The shared delegation slot. Components that escalate work upward receive
//! an `ExecutionContext` at construction and read the installed handler from
//! it; the registrar writes it exactly once.

use std::sync::{Arc, OnceLock};

use crate::callback::{CallbackEventKind, CallbackHandle};
use crate::error::{CallbackError, CallbackResult};

static GLOBAL_CONTEXT: OnceLock<ExecutionContext> = OnceLock::new();

/// Write-once slot holding the foreign callback handler
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    slot: Arc<OnceLock<CallbackHandle>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide context used by [`crate::registrar::install_callback`] and the FFI layer
    pub fn global() -> &'static ExecutionContext {
        GLOBAL_CONTEXT.get_or_init(ExecutionContext::new)
    }

    /// Bind `handle` into the slot; hands it back if the slot is already bound
    pub(crate) fn bind(&self, handle: CallbackHandle) -> Result<(), CallbackHandle> {
        self.slot.set(handle)
    }

    pub fn handler(&self) -> Option<&CallbackHandle> {
        self.slot.get()
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The installed handler, or `NoHandlerInstalled` for an event of `kind`
    pub fn require(&self, kind: CallbackEventKind) -> CallbackResult<&CallbackHandle> {
        self.slot
            .get()
            .ok_or(CallbackError::NoHandlerInstalled { kind })
    }

    /// True when both contexts share one slot
    pub fn same_slot(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("handler", &self.slot.get())
            .finish()
    }
}
