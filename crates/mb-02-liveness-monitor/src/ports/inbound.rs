//! Inbound Ports (Driving Ports)

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{LivenessState, WatchdogConfig};
use crate::error::LivenessError;
use crate::metrics::LivenessStatsSnapshot;

/// Control API of one device's liveness monitor.
#[async_trait]
pub trait LivenessApi: Send + Sync {
    /// Current cached state, without side effects.
    async fn query(&self) -> Result<LivenessState, LivenessError>;

    /// Emit the current state on the status slot and return it.
    async fn get(&self) -> Result<LivenessState, LivenessError>;

    /// Replace the watchdog interval. Accepts a number or a numeric string;
    /// anything else is rejected and the prior interval kept.
    async fn set_watchdog(&self, interval: Value) -> Result<WatchdogConfig, LivenessError>;

    fn stats(&self) -> LivenessStatsSnapshot;

    async fn shutdown(&self) -> Result<(), LivenessError>;
}
