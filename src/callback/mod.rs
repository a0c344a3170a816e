//! # Foreign Callback Capability
//!
//! The handler the native engine calls when it needs higher-level logic.
//! A [`CallbackHandle`] is the shared reference held both by the delegation
//! slot ([`crate::context::ExecutionContext`]) and by the native bridge
//! ([`crate::native::NativeCallbackBridge`]).

pub mod dispatcher;
pub mod types;

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

use crate::constants::ANONYMOUS_HANDLER_NAME;
use crate::error::CallbackResult;

pub use dispatcher::{BlobCallbackDispatcher, DispatchStats, InterpreterDelegate};
pub use types::{BlobRef, CallbackEvent, CallbackEventKind, CallbackReply};

/// Something the native engine can escalate events to
pub trait ForeignCallback: Send + Sync {
    /// Human-readable name used in logs and registration info
    fn name(&self) -> &str {
        ANONYMOUS_HANDLER_NAME
    }

    fn handle(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply>;
}

/// Adapter that lets a closure act as a [`ForeignCallback`]
pub struct FnCallback<F> {
    name: String,
    func: F,
}

impl<F> FnCallback<F>
where
    F: Fn(&CallbackEvent) -> CallbackResult<CallbackReply> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> ForeignCallback for FnCallback<F>
where
    F: Fn(&CallbackEvent) -> CallbackResult<CallbackReply> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply> {
        (self.func)(event)
    }
}

/// Shared, identity-carrying reference to a foreign callback handler
#[derive(Clone)]
pub struct CallbackHandle {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    handler: Arc<dyn ForeignCallback>,
}

impl CallbackHandle {
    pub fn new(handler: Arc<dyn ForeignCallback>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: handler.name().to_string(),
            created_at: Utc::now(),
            handler,
        }
    }

    /// Wrap a closure as a named handler
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CallbackEvent) -> CallbackResult<CallbackReply> + Send + Sync + 'static,
    {
        Self::new(Arc::new(FnCallback::new(name, func)))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn handler(&self) -> &Arc<dyn ForeignCallback> {
        &self.handler
    }

    /// True when both handles share the same underlying handler allocation
    pub fn ptr_eq(&self, other: &CallbackHandle) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }

    pub fn is_handler(&self, handler: &Arc<dyn ForeignCallback>) -> bool {
        Arc::ptr_eq(&self.handler, handler)
    }

    /// Invoke the handler
    pub fn call(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply> {
        trace!(handler = %self.name, kind = %event.kind(), "Invoking foreign callback");
        self.handler.handle(event)
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
