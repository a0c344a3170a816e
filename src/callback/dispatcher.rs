//! # Blob Callback Dispatcher
//!
//! The standard foreign callback installed at startup. Higher-level code
//! registers a closure per blob access under a `unique_id` before asking the
//! engine to touch that blob; the engine later answers with `OfBlobCall` and
//! finally `RemoveForeignCallback` for the same id. Eager-execution events are
//! forwarded to an [`InterpreterDelegate`].

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{BlobRef, CallbackEvent, CallbackEventKind, CallbackReply};
use super::ForeignCallback;
use crate::config::BridgeConfig;
use crate::constants::GLOBAL_DISPATCHER_NAME;
use crate::error::{CallbackError, CallbackResult};

/// Closure run when the engine hands over a blob
pub type BlobCallback = Arc<dyn Fn(&BlobRef) -> CallbackResult<()> + Send + Sync>;

/// Interpreter-side logic that eager-execution escalations are delegated to
pub trait InterpreterDelegate: Send + Sync {
    fn interpret_completed_op(&self, op_attribute: &str, parallel_conf: &str) -> CallbackResult<()>;

    fn mirrored_cast(&self, op_attribute: &str, parallel_conf: &str) -> CallbackResult<()>;

    fn make_scope_symbol(&self, scope_proto: &str) -> CallbackResult<i64>;

    fn make_parallel_desc_symbol(&self, parallel_conf: &str) -> CallbackResult<i64>;
}

/// Per-kind dispatch counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: HashMap<CallbackEventKind, u64>,
    pub failed: u64,
}

impl DispatchStats {
    pub fn count(&self, kind: CallbackEventKind) -> u64 {
        self.dispatched.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.dispatched.values().sum()
    }
}

pub struct BlobCallbackDispatcher {
    name: String,
    blob_callbacks: DashMap<i64, BlobCallback>,
    next_id: AtomicI64,
    delegate: Option<Arc<dyn InterpreterDelegate>>,
    strict: bool,
    stats: Mutex<DispatchStats>,
}

impl BlobCallbackDispatcher {
    /// Create a dispatcher; `strict` makes unknown blob ids an error
    pub fn new(strict: bool) -> Self {
        Self {
            name: GLOBAL_DISPATCHER_NAME.to_string(),
            blob_callbacks: DashMap::new(),
            next_id: AtomicI64::new(1),
            delegate: None,
            strict,
            stats: Mutex::new(DispatchStats::default()),
        }
    }

    /// Create a dispatcher whose strictness follows `strict_blob_dispatch`
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.strict_blob_dispatch)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn InterpreterDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Register a blob callback and return the id the engine will call it by
    pub fn register_blob_callback<F>(&self, callback: F) -> i64
    where
        F: Fn(&BlobRef) -> CallbackResult<()> + Send + Sync + 'static,
    {
        let unique_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.blob_callbacks.insert(unique_id, Arc::new(callback));
        debug!(dispatcher = %self.name, unique_id, "Registered blob callback");
        unique_id
    }

    pub fn remove_blob_callback(&self, unique_id: i64) -> bool {
        self.blob_callbacks.remove(&unique_id).is_some()
    }

    pub fn pending_blob_callbacks(&self) -> usize {
        self.blob_callbacks.len()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.lock().clone()
    }

    fn run_blob_callback(&self, unique_id: i64, blob: &BlobRef) -> CallbackResult<CallbackReply> {
        // Clone out of the map so the callback may register or remove ids itself
        let callback = self
            .blob_callbacks
            .get(&unique_id)
            .map(|entry| Arc::clone(entry.value()));

        match callback {
            Some(callback) => {
                callback(blob)?;
                Ok(CallbackReply::Done)
            }
            None if self.strict => Err(CallbackError::UnknownBlobCallback { unique_id }),
            None => {
                warn!(dispatcher = %self.name, unique_id, "OfBlobCall for unknown blob callback ignored");
                Ok(CallbackReply::Done)
            }
        }
    }

    fn delegate(&self, kind: CallbackEventKind) -> CallbackResult<&Arc<dyn InterpreterDelegate>> {
        self.delegate
            .as_ref()
            .ok_or(CallbackError::DelegateUnavailable { kind })
    }

    fn dispatch(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply> {
        let kind = event.kind();
        match event {
            CallbackEvent::OfBlobCall { unique_id, blob } => self.run_blob_callback(*unique_id, blob),
            CallbackEvent::RemoveForeignCallback { unique_id } => {
                if !self.remove_blob_callback(*unique_id) {
                    debug!(dispatcher = %self.name, unique_id, "Remove requested for unknown blob callback");
                }
                Ok(CallbackReply::Done)
            }
            CallbackEvent::EagerInterpretCompletedOp {
                op_attribute,
                parallel_conf,
            } => {
                self.delegate(kind)?
                    .interpret_completed_op(op_attribute, parallel_conf)?;
                Ok(CallbackReply::Done)
            }
            CallbackEvent::EagerMirroredCast {
                op_attribute,
                parallel_conf,
            } => {
                self.delegate(kind)?.mirrored_cast(op_attribute, parallel_conf)?;
                Ok(CallbackReply::Done)
            }
            CallbackEvent::MakeScopeSymbol { scope_proto } => self
                .delegate(kind)?
                .make_scope_symbol(scope_proto)
                .map(CallbackReply::Symbol),
            CallbackEvent::MakeParallelDescSymbol { parallel_conf } => self
                .delegate(kind)?
                .make_parallel_desc_symbol(parallel_conf)
                .map(CallbackReply::Symbol),
        }
    }
}

impl ForeignCallback for BlobCallbackDispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &CallbackEvent) -> CallbackResult<CallbackReply> {
        let result = self.dispatch(event);

        let mut stats = self.stats.lock();
        *stats.dispatched.entry(event.kind()).or_insert(0) += 1;
        if result.is_err() {
            stats.failed += 1;
        }

        result
    }
}

impl fmt::Debug for BlobCallbackDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobCallbackDispatcher")
            .field("name", &self.name)
            .field("pending_blob_callbacks", &self.blob_callbacks.len())
            .field("has_delegate", &self.delegate.is_some())
            .field("strict", &self.strict)
            .finish()
    }
}
