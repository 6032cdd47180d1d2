//! Error types for the RPC correlation engine

use shared_bus::TransportError;
use shared_types::{CorrelationId, WireError};
use thiserror::Error;

/// Errors that can occur in the RPC correlation engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Correlation id already pending: {0}")]
    DuplicateId(CorrelationId),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// `submit` after the engine was closed.
    #[error("Engine closed")]
    Closed,

    /// The actor task is gone; its command channel is closed.
    #[error("Engine task stopped")]
    EngineStopped,
}
