//! # Bridge Configuration
//!
//! Unified configuration for the client identity, the broadcast namespace,
//! the RPC engines, the liveness monitor and the runtime mode.
//!
//! Values start from their defaults and can be overridden from `MOS_*`
//! environment variables. Unparseable overrides are ignored with a warning.

use mb_01_rpc_correlation::domain::config::{DEFAULT_SWEEP_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use mb_02_liveness_monitor::LivenessSettings;
use serde::{Deserialize, Serialize};
use shared_bus::QoS;
use shared_types::BroadcastNamespace;
use thiserror::Error;
use tracing::warn;

/// Characters that would split or wildcard a topic segment.
const TOPIC_SEPARATORS: [char; 3] = ['/', '+', '#'];

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Who we are and which device we talk to.
    pub identity: IdentityConfig,
    /// Broadcast topic namespace of the device.
    pub namespace: BroadcastNamespace,
    /// RPC engine configuration.
    pub rpc: RpcSection,
    /// Liveness monitor configuration.
    pub liveness: LivenessSection,
    /// Publish options.
    pub transport: TransportConfig,
    /// Loopback device simulation.
    pub simulator: SimulatorConfig,
}

/// Client and device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Unique id of this bridge instance; prefixes every reply topic.
    pub self_id: String,
    /// Target device.
    pub device_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            self_id: uuid::Uuid::new_v4().simple().to_string(),
            device_id: "mos-device".to_string(),
        }
    }
}

/// Services and timing of the RPC engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcSection {
    /// One engine is created per service.
    pub services: Vec<String>,
    pub timeout_ms: u64,
    pub sweep_interval_ms: u64,
    /// Also forward `<service>.Update` broadcasts.
    pub subscribe_updates: bool,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            services: vec!["Sys".to_string()],
            timeout_ms: DEFAULT_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            subscribe_updates: true,
        }
    }
}

/// Watchdog and diagnostic toggles of the liveness monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessSection {
    /// Watchdog interval in seconds; 0 disables it.
    pub watchdog_secs: u64,
    pub settings: LivenessSettings,
}

/// Publish options shared by every engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub qos: u8,
    pub retain: bool,
}

impl TransportConfig {
    pub fn qos(&self) -> Result<QoS, ConfigError> {
        QoS::try_from(self.qos).map_err(|_| ConfigError::InvalidQoS(self.qos))
    }
}

/// Loopback simulation of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub enabled: bool,
    /// Period of the simulated SysInfo heartbeat.
    pub heartbeat_interval_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval_ms: 5_000,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} contains a topic separator: {value:?}")]
    TopicSeparator { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("QoS must be 0, 1 or 2, got {0}")]
    InvalidQoS(u8),

    #[error("no RPC services configured")]
    NoServices,

    #[error("service {0:?} configured twice")]
    DuplicateService(String),
}

impl BridgeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `MOS_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = text("MOS_SELF_ID") {
            self.identity.self_id = v;
        }
        if let Some(v) = text("MOS_DEVICE_ID") {
            self.identity.device_id = v;
        }
        if let Some(v) = text("MOS_DOMAIN") {
            self.namespace.domain = v;
        }
        if let Some(v) = text("MOS_BUS") {
            self.namespace.bus = v;
        }
        if let Some(v) = text("MOS_VERSION") {
            self.namespace.version = v;
        }
        if let Some(v) = text("MOS_BROADCAST") {
            self.namespace.broadcast = v;
        }
        if let Some(v) = text("MOS_SERVICES") {
            self.rpc.services = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        override_parsed(&text, "MOS_RPC_TIMEOUT_MS", &mut self.rpc.timeout_ms);
        override_parsed(&text, "MOS_SWEEP_INTERVAL_MS", &mut self.rpc.sweep_interval_ms);
        override_parsed(&text, "MOS_WATCHDOG_SECS", &mut self.liveness.watchdog_secs);
        override_parsed(&text, "MOS_QOS", &mut self.transport.qos);
        override_parsed(
            &text,
            "MOS_SIMULATOR_HEARTBEAT_MS",
            &mut self.simulator.heartbeat_interval_ms,
        );

        let settings = &mut self.liveness.settings;
        override_flag(&text, "MOS_LOG_STATUS", &mut settings.log_status);
        override_flag(&text, "MOS_LOG_INFO", &mut settings.log_info);
        override_flag(&text, "MOS_LOG_SYSINFO", &mut settings.log_sysinfo);
        override_flag(&text, "MOS_LOG_SETTINGS", &mut settings.log_settings);
        override_flag(&text, "MOS_SUBSCRIBE_UPDATES", &mut self.rpc.subscribe_updates);
        override_flag(&text, "MOS_RETAIN", &mut self.transport.retain);
        override_flag(&text, "MOS_SIMULATE", &mut self.simulator.enabled);
    }

    /// Reject configurations the engines could not run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_segment("self_id", &self.identity.self_id)?;
        check_segment("device_id", &self.identity.device_id)?;
        check_segment("domain", &self.namespace.domain)?;
        check_segment("bus", &self.namespace.bus)?;
        check_segment("version", &self.namespace.version)?;
        check_segment("broadcast", &self.namespace.broadcast)?;

        if self.rpc.services.is_empty() {
            return Err(ConfigError::NoServices);
        }
        for (i, service) in self.rpc.services.iter().enumerate() {
            check_segment("service", service)?;
            if self.rpc.services[..i].contains(service) {
                return Err(ConfigError::DuplicateService(service.clone()));
            }
        }

        if self.rpc.timeout_ms == 0 {
            return Err(ConfigError::Zero { field: "rpc_timeout_ms" });
        }
        if self.rpc.sweep_interval_ms == 0 {
            return Err(ConfigError::Zero { field: "sweep_interval_ms" });
        }
        if self.simulator.enabled && self.simulator.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Zero { field: "simulator_heartbeat_ms" });
        }
        self.transport.qos()?;
        Ok(())
    }
}

fn check_segment(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty { field });
    }
    if value.contains(TOPIC_SEPARATORS) {
        return Err(ConfigError::TopicSeparator {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn override_parsed<T: std::str::FromStr>(
    text: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = text(key) {
        match raw.parse() {
            Ok(v) => *target = v,
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable override"),
        }
    }
}

fn override_flag(text: &impl Fn(&str) -> Option<String>, key: &str, target: &mut bool) {
    if let Some(raw) = text(key) {
        match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => *target = true,
            "0" | "false" | "no" | "off" => *target = false,
            _ => warn!(key, value = %raw, "Ignoring unparseable flag"),
        }
    }
}
