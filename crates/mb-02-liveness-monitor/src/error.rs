//! Error types for the liveness monitor

use shared_bus::TransportError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LivenessError {
    /// Watchdog interval that is not a non-negative integer.
    #[error("Invalid watchdog interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The monitor task is gone.
    #[error("Monitor task stopped")]
    MonitorStopped,
}
