//! # Shared Types Crate
//!
//! Types shared by the RPC correlation engine, the liveness monitor and the
//! runtime that wires them to a transport.
//!
//! ## Contents
//!
//! - **Topic Namer** (`topics`): pure functions building transport topics.
//! - **Correlation ids** (`correlation`): per-engine monotonic request ids.
//! - **Wire formats** (`wire`): request encoding and reply classification.
//! - **Event Sink contract** (`output`): tagged outputs, slots and the
//!   status indicator.
//! - **Time source port** (`time`).

pub mod correlation;
pub mod errors;
pub mod output;
pub mod time;
pub mod topics;
pub mod wire;

pub use correlation::{CorrelationId, CorrelationIdGenerator};
pub use errors::{codes, WireError};
pub use output::{
    EventSink, NodeOutput, NodeStatus, OutputKind, OutputSlot, RecordingSink, StatusFill,
    StatusShape,
};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
pub use topics::BroadcastNamespace;
pub use wire::{ParsedReply, ReplyBody, ReplyId, WireRequest};
