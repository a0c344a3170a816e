//! # Interpreter Bridge
//!
//! Eager-execution code that needs higher-level logic (interpreting a
//! completed op, creating scope or placement symbols) escalates through the
//! handler found in its injected [`ExecutionContext`].

use tracing::debug;

use crate::callback::{CallbackEvent, CallbackReply};
use crate::context::ExecutionContext;
use crate::error::CallbackResult;

#[derive(Debug, Clone)]
pub struct InterpreterBridge {
    context: ExecutionContext,
}

impl InterpreterBridge {
    pub fn new(context: ExecutionContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn interpret_completed_op(
        &self,
        op_attribute: impl Into<String>,
        parallel_conf: impl Into<String>,
    ) -> CallbackResult<()> {
        self.escalate(CallbackEvent::EagerInterpretCompletedOp {
            op_attribute: op_attribute.into(),
            parallel_conf: parallel_conf.into(),
        })
        .map(|_| ())
    }

    pub fn mirrored_cast(
        &self,
        op_attribute: impl Into<String>,
        parallel_conf: impl Into<String>,
    ) -> CallbackResult<()> {
        self.escalate(CallbackEvent::EagerMirroredCast {
            op_attribute: op_attribute.into(),
            parallel_conf: parallel_conf.into(),
        })
        .map(|_| ())
    }

    /// Returns the symbol id assigned to `scope_proto`
    pub fn make_scope_symbol(&self, scope_proto: impl Into<String>) -> CallbackResult<i64> {
        let event = CallbackEvent::MakeScopeSymbol {
            scope_proto: scope_proto.into(),
        };
        let kind = event.kind();
        self.escalate(event)?.into_symbol(kind)
    }

    /// Returns the symbol id assigned to `parallel_conf`
    pub fn make_parallel_desc_symbol(&self, parallel_conf: impl Into<String>) -> CallbackResult<i64> {
        let event = CallbackEvent::MakeParallelDescSymbol {
            parallel_conf: parallel_conf.into(),
        };
        let kind = event.kind();
        self.escalate(event)?.into_symbol(kind)
    }

    fn escalate(&self, event: CallbackEvent) -> CallbackResult<CallbackReply> {
        let handle = self.context.require(event.kind())?;
        debug!(handler = %handle.name(), kind = %event.kind(), "Escalating to foreign callback");
        handle.call(&event)
    }
}
