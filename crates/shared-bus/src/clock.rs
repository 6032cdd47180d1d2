//! Runtime clock.
//!
//! A `TimeSource` reading tokio's clock, so timeouts follow
//! `tokio::time::pause`/`advance` in tests.

use shared_types::{TimeSource, Timestamp};
use tokio::time::Instant;

/// Milliseconds elapsed since the clock was created, on tokio's clock.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioClock {
    fn now(&self) -> Timestamp {
        self.base.elapsed().as_millis() as Timestamp
    }
}
