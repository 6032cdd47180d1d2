//! Prometheus metrics for the bridge.
//!
//! All metrics follow the naming convention: `mos_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, GaugeVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Once;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Engine outputs by kind (success/error/warning/online/log)
    pub static ref RPC_OUTPUTS: CounterVec = CounterVec::new(
        Opts::new("mos_rpc_outputs_total", "Outputs delivered to the event sink by kind"),
        &["kind"]
    ).expect("metric creation failed");

    /// 1 while a device is online, 0 while offline
    pub static ref DEVICE_ONLINE: GaugeVec = GaugeVec::new(
        Opts::new("mos_device_online", "Device liveness (1 online, 0 offline)"),
        &["device"]
    ).expect("metric creation failed");

    /// Heartbeat payloads forwarded, by channel (SysInfo/Info)
    pub static ref HEARTBEATS: CounterVec = CounterVec::new(
        Opts::new("mos_heartbeats_total", "Heartbeat payloads received by channel"),
        &["channel"]
    ).expect("metric creation failed");

    /// Requests awaiting a reply across all engines
    pub static ref PENDING_REQUESTS: IntGauge = IntGauge::new(
        "mos_rpc_pending_requests",
        "Requests currently awaiting a reply"
    ).expect("metric creation failed");
}

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let mut result = Ok(());
    REGISTER.call_once(|| {
        let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(RPC_OUTPUTS.clone()),
            Box::new(DEVICE_ONLINE.clone()),
            Box::new(HEARTBEATS.clone()),
            Box::new(PENDING_REQUESTS.clone()),
        ];
        for metric in metrics {
            if let Err(e) = REGISTRY.register(metric) {
                result = Err(TelemetryError::MetricsInit(e.to_string()));
                return;
            }
        }
    });
    result
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
