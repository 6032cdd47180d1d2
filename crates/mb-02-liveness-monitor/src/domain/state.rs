//! Liveness state and heartbeat channels

use serde::{Deserialize, Serialize};
use shared_types::{topics, BroadcastNamespace};
use std::fmt;

/// Cached online indicator of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessState {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl LivenessState {
    /// `None` while unknown.
    pub fn as_online(&self) -> Option<bool> {
        match self {
            LivenessState::Unknown => None,
            LivenessState::Online => Some(true),
            LivenessState::Offline => Some(false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessState::Unknown => "unknown",
            LivenessState::Online => "online",
            LivenessState::Offline => "offline",
        }
    }
}

impl fmt::Display for LivenessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsolicited broadcast channels that count as heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeartbeatChannel {
    /// Periodic system-info broadcast
    SysInfo,
    /// General info broadcast
    Info,
}

impl HeartbeatChannel {
    pub const ALL: [HeartbeatChannel; 2] = [HeartbeatChannel::SysInfo, HeartbeatChannel::Info];

    /// Topic leaf, also used as the output topic of forwarded payloads.
    pub fn leaf(&self) -> &'static str {
        match self {
            HeartbeatChannel::SysInfo => topics::SYSINFO_LEAF,
            HeartbeatChannel::Info => topics::INFO_LEAF,
        }
    }

    pub fn topic(&self, ns: &BroadcastNamespace, device_id: &str) -> String {
        match self {
            HeartbeatChannel::SysInfo => topics::sysinfo_topic(ns, device_id),
            HeartbeatChannel::Info => topics::info_topic(ns, device_id),
        }
    }
}
