//! Engine configuration

use serde::{Deserialize, Serialize};
use shared_bus::QoS;
use shared_types::topics;

use crate::error::RpcError;

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default sweep period in milliseconds (one time unit).
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;

/// Configuration of one RPC correlation engine, i.e. one
/// (client, device, service) triple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Identity of the client issuing requests
    pub self_id: String,
    /// Target device
    pub device_id: String,
    /// Service on the device, e.g. `Temp`
    pub service: String,
    /// Age at which a pending request is evicted with 408
    pub timeout_ms: u64,
    /// Sweep period while requests are pending
    pub sweep_interval_ms: u64,
    pub qos: QoS,
    pub retain: bool,
}

impl RpcConfig {
    pub fn new(
        self_id: impl Into<String>,
        device_id: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            device_id: device_id.into(),
            service: service.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_sweep_interval_ms(mut self, sweep_interval_ms: u64) -> Self {
        self.sweep_interval_ms = sweep_interval_ms;
        self
    }

    pub fn with_qos(mut self, qos: QoS, retain: bool) -> Self {
        self.qos = qos;
        self.retain = retain;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RpcError> {
        for (name, value) in [
            ("self_id", &self.self_id),
            ("device_id", &self.device_id),
            ("service", &self.service),
        ] {
            if value.is_empty() {
                return Err(RpcError::InvalidConfig(format!("{} is empty", name)));
            }
            if value.contains(['/', '+', '#']) {
                return Err(RpcError::InvalidConfig(format!(
                    "{} contains a topic separator: {}",
                    name, value
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(RpcError::InvalidConfig("timeout_ms must be > 0".into()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(RpcError::InvalidConfig(
                "sweep_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Node id used on every output of this engine.
    pub fn node_id(&self) -> String {
        format!("{}/{}", self.device_id, self.service)
    }

    pub fn request_topic(&self, method: &str) -> String {
        topics::rpc_request_topic(&self.device_id, &self.service, method)
    }

    pub fn reply_source(&self) -> String {
        topics::rpc_reply_source(&self.self_id, &self.device_id, &self.service)
    }

    pub fn reply_topic(&self) -> String {
        topics::rpc_reply_topic(&self.self_id, &self.device_id, &self.service)
    }

    pub fn wire_method(&self, method: &str) -> String {
        topics::rpc_method(&self.service, method)
    }
}
