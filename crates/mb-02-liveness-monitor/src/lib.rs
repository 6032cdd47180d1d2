//! # MB-02 Liveness Monitor
//!
//! Tracks whether a remote device is online from its unsolicited SysInfo and
//! Info broadcasts, with a watchdog deadline of `interval + 1` seconds.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `LivenessState`, `HeartbeatChannel`,
//!   `WatchdogConfig`, `LivenessSettings`
//! - **Ports Layer** (`ports/`): `LivenessApi`
//! - **Service Layer** (`service/`): `LivenessMonitor`
//! - **Adapters Layer** (`adapters/`): `LivenessBusAdapter`, `LivenessHandle`
//!
//! ## Outputs
//!
//! - `online` (status slot): `{"online": true|false|null}` on every state
//!   change and on explicit GET
//! - `success`: heartbeat payloads, topic `SysInfo` or `Info`
//! - `log`: transitions, payloads and reconfigurations, each behind its own
//!   toggle

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{LivenessBusAdapter, LivenessCommand, LivenessHandle};
pub use domain::{HeartbeatChannel, LivenessConfig, LivenessSettings, LivenessState, WatchdogConfig};
pub use error::LivenessError;
pub use metrics::{LivenessStats, LivenessStatsSnapshot};
pub use ports::LivenessApi;
pub use service::LivenessMonitor;
