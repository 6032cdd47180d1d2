//! Liveness Monitor
//!
//! Infers online/offline for one device from heartbeat arrivals and a
//! watchdog deadline. Events are edge-triggered: only a change of state is
//! reported.
//!
//! ```text
//!   Unknown ──heartbeat──▶ Online ◀──heartbeat── Offline
//!      │                     │                     ▲
//!      └──────deadline───────┴──────deadline───────┘
//! ```
//!
//! At most one deadline is pending at a time; every heartbeat and every
//! reconfiguration replaces it.

use serde_json::{json, Value};
use shared_types::wire::decode_json;
use shared_types::{EventSink, NodeOutput, NodeStatus, TimeSource, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{HeartbeatChannel, LivenessConfig, LivenessState, WatchdogConfig};
use crate::error::LivenessError;
use crate::metrics::LivenessStats;

/// Output topic of transition logs.
const STATUS_LOG_TOPIC: &str = "status";

/// Output topic of reconfiguration logs.
const SETTINGS_LOG_TOPIC: &str = "settings";

pub struct LivenessMonitor {
    config: LivenessConfig,
    node_id: String,
    sink: Arc<dyn EventSink>,
    time: Arc<dyn TimeSource>,
    state: LivenessState,
    deadline: Option<Timestamp>,
    stats: Arc<LivenessStats>,
    closed: bool,
}

impl LivenessMonitor {
    pub fn new(
        config: LivenessConfig,
        sink: Arc<dyn EventSink>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, LivenessError> {
        config.validate()?;
        let node_id = config.node_id();
        Ok(Self {
            config,
            node_id,
            sink,
            time,
            state: LivenessState::Unknown,
            deadline: None,
            stats: Arc::new(LivenessStats::new()),
            closed: false,
        })
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn stats(&self) -> Arc<LivenessStats> {
        Arc::clone(&self.stats)
    }

    pub fn watchdog(&self) -> WatchdogConfig {
        self.config.watchdog
    }

    /// Current cached state; no side effects.
    pub fn query(&self) -> LivenessState {
        self.state
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    pub fn time_until_deadline(&self) -> Option<Duration> {
        self.deadline
            .map(|at| Duration::from_millis(at.saturating_sub(self.time.now())))
    }

    /// Arm the first deadline so a device that never speaks is declared
    /// offline.
    pub fn start(&mut self) {
        self.restart_deadline();
        debug!(
            node = %self.node_id,
            watchdog_secs = self.config.watchdog.interval_secs,
            "Liveness monitor started"
        );
    }

    /// Deliver the current state on the status slot (the explicit GET).
    pub fn report(&self) -> LivenessState {
        self.sink
            .deliver(NodeOutput::online(&self.node_id, self.state.as_online()));
        self.state
    }

    /// Handle a heartbeat on either channel.
    ///
    /// Liveness is refreshed even when the payload does not decode; only the
    /// forwarding of the payload is skipped then.
    pub fn on_heartbeat(&mut self, channel: HeartbeatChannel, raw: &[u8]) {
        if self.closed {
            return;
        }
        self.stats.record_heartbeat(channel);
        self.restart_deadline();

        let payload = match decode_json(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                LivenessStats::incr(&self.stats.malformed_heartbeats);
                warn!(node = %self.node_id, channel = channel.leaf(), error = %e, "Undecodable heartbeat");
                None
            }
        };

        if self.state != LivenessState::Online {
            let trigger = payload
                .clone()
                .unwrap_or_else(|| Value::String(String::from_utf8_lossy(raw).into_owned()));
            self.transition(LivenessState::Online, Some(trigger));
        }

        let Some(payload) = payload else {
            return;
        };

        let log_enabled = match channel {
            HeartbeatChannel::SysInfo => self.config.settings.log_sysinfo,
            HeartbeatChannel::Info => self.config.settings.log_info,
        };
        if log_enabled {
            self.sink
                .deliver(NodeOutput::log(&self.node_id, channel.leaf(), payload.clone()));
        }
        self.sink
            .deliver(NodeOutput::success(&self.node_id, channel.leaf(), payload));
    }

    /// Fire the deadline if it is due at `now`.
    pub fn poll_deadline(&mut self) -> bool {
        match self.deadline {
            Some(at) if self.time.now() >= at => {
                self.on_deadline();
                true
            }
            _ => false,
        }
    }

    /// The deadline elapsed without a heartbeat.
    pub fn on_deadline(&mut self) {
        if self.closed {
            return;
        }
        self.deadline = None;
        debug!(node = %self.node_id, "Watchdog deadline elapsed");
        self.transition(LivenessState::Offline, None);
    }

    /// Apply a new watchdog interval, replacing any pending deadline.
    pub fn reconfigure(&mut self, watchdog: WatchdogConfig) {
        self.config.watchdog = watchdog;
        self.restart_deadline();
        info!(
            node = %self.node_id,
            watchdog_secs = watchdog.interval_secs,
            "Watchdog reconfigured"
        );
        if self.config.settings.log_settings {
            self.sink.deliver(NodeOutput::log(
                &self.node_id,
                SETTINGS_LOG_TOPIC,
                json!({
                    "device": self.config.device_id,
                    "watchdog": watchdog.interval_secs,
                }),
            ));
        }
    }

    /// Parse and apply a raw reconfiguration input. Invalid input is
    /// rejected and the prior configuration kept.
    pub fn reconfigure_raw(&mut self, value: &Value) -> Result<WatchdogConfig, LivenessError> {
        match WatchdogConfig::parse(value) {
            Ok(watchdog) => {
                self.reconfigure(watchdog);
                Ok(watchdog)
            }
            Err(e) => {
                LivenessStats::incr(&self.stats.rejected_reconfigurations);
                warn!(
                    node = %self.node_id,
                    error = %e,
                    kept_secs = self.config.watchdog.interval_secs,
                    "Rejected watchdog reconfiguration"
                );
                Err(e)
            }
        }
    }

    /// Cancel the deadline and ignore further input.
    pub fn shutdown(&mut self) {
        self.deadline = None;
        self.closed = true;
        info!(node = %self.node_id, state = %self.state, "Liveness monitor stopped");
    }

    fn restart_deadline(&mut self) {
        self.deadline = self
            .config
            .watchdog
            .deadline_ms()
            .map(|ms| self.time.now().saturating_add(ms));
    }

    fn transition(&mut self, to: LivenessState, trigger: Option<Value>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;

        let status = match to {
            LivenessState::Online => {
                LivenessStats::incr(&self.stats.online_transitions);
                info!(node = %self.node_id, from = %from, "Device online");
                NodeStatus::online()
            }
            LivenessState::Offline => {
                LivenessStats::incr(&self.stats.offline_transitions);
                warn!(node = %self.node_id, from = %from, "Device offline");
                NodeStatus::offline()
            }
            LivenessState::Unknown => return,
        };

        self.sink
            .deliver(NodeOutput::online(&self.node_id, to.as_online()));
        self.sink.set_status(&self.node_id, status);

        if self.config.settings.log_status {
            self.sink.deliver(NodeOutput::log(
                &self.node_id,
                STATUS_LOG_TOPIC,
                json!({
                    "device": self.config.device_id,
                    "from": from.as_str(),
                    "to": to.as_str(),
                    "payload": trigger,
                }),
            ));
        }
    }
}
