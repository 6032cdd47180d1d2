//! Domain layer

pub mod config;
pub mod state;

pub use config::{LivenessConfig, LivenessSettings, WatchdogConfig};
pub use state::{HeartbeatChannel, LivenessState};
