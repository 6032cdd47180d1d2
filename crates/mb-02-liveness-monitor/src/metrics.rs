//! Per-monitor counters

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::HeartbeatChannel;

#[derive(Debug, Default)]
pub struct LivenessStats {
    pub sysinfo_heartbeats: AtomicU64,
    pub info_heartbeats: AtomicU64,
    /// Heartbeats whose payload could not be decoded
    pub malformed_heartbeats: AtomicU64,
    pub online_transitions: AtomicU64,
    pub offline_transitions: AtomicU64,
    pub rejected_reconfigurations: AtomicU64,
}

impl LivenessStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_heartbeat(&self, channel: HeartbeatChannel) {
        let counter = match channel {
            HeartbeatChannel::SysInfo => &self.sysinfo_heartbeats,
            HeartbeatChannel::Info => &self.info_heartbeats,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LivenessStatsSnapshot {
        LivenessStatsSnapshot {
            sysinfo_heartbeats: self.sysinfo_heartbeats.load(Ordering::Relaxed),
            info_heartbeats: self.info_heartbeats.load(Ordering::Relaxed),
            malformed_heartbeats: self.malformed_heartbeats.load(Ordering::Relaxed),
            online_transitions: self.online_transitions.load(Ordering::Relaxed),
            offline_transitions: self.offline_transitions.load(Ordering::Relaxed),
            rejected_reconfigurations: self.rejected_reconfigurations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessStatsSnapshot {
    pub sysinfo_heartbeats: u64,
    pub info_heartbeats: u64,
    pub malformed_heartbeats: u64,
    pub online_transitions: u64,
    pub offline_transitions: u64,
    pub rejected_reconfigurations: u64,
}

impl LivenessStatsSnapshot {
    pub fn heartbeats(&self) -> u64 {
        self.sysinfo_heartbeats + self.info_heartbeats
    }
}
