//! Monitor configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::BroadcastNamespace;

use crate::error::LivenessError;

/// Watchdog interval in seconds; 0 disables the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WatchdogConfig {
    pub interval_secs: u64,
}

impl WatchdogConfig {
    pub fn new(interval_secs: u64) -> Self {
        Self { interval_secs }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_secs > 0
    }

    /// Silence allowed before declaring offline: `interval + 1` seconds,
    /// in milliseconds. `None` when disabled.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.is_enabled()
            .then(|| self.interval_secs.saturating_add(1).saturating_mul(1_000))
    }

    /// Parse a reconfiguration input: a non-negative integer, or a string
    /// holding one.
    pub fn parse(value: &Value) -> Result<Self, LivenessError> {
        let secs = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        secs.map(Self::new)
            .ok_or_else(|| LivenessError::InvalidInterval(value.to_string()))
    }
}

/// Toggles for the diagnostic log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LivenessSettings {
    /// Log online/offline transitions
    pub log_status: bool,
    /// Log every Info payload
    pub log_info: bool,
    /// Log every SysInfo payload
    pub log_sysinfo: bool,
    /// Log watchdog reconfigurations
    pub log_settings: bool,
}

/// Configuration of one monitor (one device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    pub device_id: String,
    pub namespace: BroadcastNamespace,
    pub watchdog: WatchdogConfig,
    pub settings: LivenessSettings,
}

impl LivenessConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            namespace: BroadcastNamespace::default(),
            watchdog: WatchdogConfig::disabled(),
            settings: LivenessSettings::default(),
        }
    }

    pub fn with_watchdog(mut self, interval_secs: u64) -> Self {
        self.watchdog = WatchdogConfig::new(interval_secs);
        self
    }

    pub fn with_namespace(mut self, namespace: BroadcastNamespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_settings(mut self, settings: LivenessSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn validate(&self) -> Result<(), LivenessError> {
        if self.device_id.is_empty() {
            return Err(LivenessError::InvalidConfig("device_id is empty".into()));
        }
        if self.device_id.contains(['/', '+', '#']) {
            return Err(LivenessError::InvalidConfig(format!(
                "device_id contains a topic separator: {}",
                self.device_id
            )));
        }
        Ok(())
    }

    pub fn node_id(&self) -> String {
        format!("{}/liveness", self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deadline() {
        assert_eq!(WatchdogConfig::new(5).deadline_ms(), Some(6_000));
        assert_eq!(WatchdogConfig::disabled().deadline_ms(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!(WatchdogConfig::parse(&json!(30)).unwrap().interval_secs, 30);
        assert_eq!(WatchdogConfig::parse(&json!(" 7 ")).unwrap().interval_secs, 7);
        assert_eq!(WatchdogConfig::parse(&json!(0)).unwrap(), WatchdogConfig::disabled());
        for bad in [json!(-1), json!(1.5), json!("abc"), json!(null), json!({})] {
            assert!(matches!(
                WatchdogConfig::parse(&bad),
                Err(LivenessError::InvalidInterval(_))
            ));
        }
    }

    #[test]
    fn test_validate() {
        assert!(LivenessConfig::new("dev").validate().is_ok());
        assert!(LivenessConfig::new("").validate().is_err());
        assert!(LivenessConfig::new("a/b").validate().is_err());
        assert_eq!(LivenessConfig::new("dev").node_id(), "dev/liveness");
    }
}
