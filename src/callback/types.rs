//! Events the native engine escalates through the foreign callback, and the
//! replies handlers send back.
//!
//! Payloads are opaque serialized descriptors; this crate routes them and
//! never interprets their contents.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CallbackError, CallbackResult};

/// Opaque reference to a blob owned by the native engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Address of the native blob accessor, valid only for the duration of the call
    pub of_blob_ptr: u64,
}

/// Discriminant of [`CallbackEvent`], used for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackEventKind {
    OfBlobCall,
    RemoveForeignCallback,
    EagerInterpretCompletedOp,
    EagerMirroredCast,
    MakeScopeSymbol,
    MakeParallelDescSymbol,
}

impl CallbackEventKind {
    pub const ALL: [CallbackEventKind; 6] = [
        Self::OfBlobCall,
        Self::RemoveForeignCallback,
        Self::EagerInterpretCompletedOp,
        Self::EagerMirroredCast,
        Self::MakeScopeSymbol,
        Self::MakeParallelDescSymbol,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfBlobCall => "of_blob_call",
            Self::RemoveForeignCallback => "remove_foreign_callback",
            Self::EagerInterpretCompletedOp => "eager_interpret_completed_op",
            Self::EagerMirroredCast => "eager_mirrored_cast",
            Self::MakeScopeSymbol => "make_scope_symbol",
            Self::MakeParallelDescSymbol => "make_parallel_desc_symbol",
        }
    }

    /// Whether handlers must answer this event with [`CallbackReply::Symbol`]
    pub fn expects_symbol(&self) -> bool {
        matches!(self, Self::MakeScopeSymbol | Self::MakeParallelDescSymbol)
    }
}

impl fmt::Display for CallbackEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An escalation from the native engine to higher-level logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallbackEvent {
    /// Run the blob callback registered under `unique_id`
    OfBlobCall { unique_id: i64, blob: BlobRef },
    /// Drop the blob callback registered under `unique_id`
    RemoveForeignCallback { unique_id: i64 },
    EagerInterpretCompletedOp {
        op_attribute: String,
        parallel_conf: String,
    },
    EagerMirroredCast {
        op_attribute: String,
        parallel_conf: String,
    },
    MakeScopeSymbol { scope_proto: String },
    MakeParallelDescSymbol { parallel_conf: String },
}

impl CallbackEvent {
    pub fn kind(&self) -> CallbackEventKind {
        match self {
            Self::OfBlobCall { .. } => CallbackEventKind::OfBlobCall,
            Self::RemoveForeignCallback { .. } => CallbackEventKind::RemoveForeignCallback,
            Self::EagerInterpretCompletedOp { .. } => CallbackEventKind::EagerInterpretCompletedOp,
            Self::EagerMirroredCast { .. } => CallbackEventKind::EagerMirroredCast,
            Self::MakeScopeSymbol { .. } => CallbackEventKind::MakeScopeSymbol,
            Self::MakeParallelDescSymbol { .. } => CallbackEventKind::MakeParallelDescSymbol,
        }
    }
}

/// A handler's answer to a [`CallbackEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "value", rename_all = "snake_case")]
pub enum CallbackReply {
    Done,
    Symbol(i64),
}

impl CallbackReply {
    /// Extract a symbol id, rejecting any other reply for `kind`
    pub fn into_symbol(self, kind: CallbackEventKind) -> CallbackResult<i64> {
        match self {
            Self::Symbol(id) => Ok(id),
            Self::Done => Err(CallbackError::UnexpectedReply {
                kind,
                expected: "symbol id",
            }),
        }
    }
}
