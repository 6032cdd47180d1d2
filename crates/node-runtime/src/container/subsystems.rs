//! # Bridge Container
//!
//! Builds and owns every running piece of the bridge:
//!
//! ```text
//! BridgeConfig ──→ BridgeClient (identity, transport)
//!                     │
//!        ┌────────────┼─────────────────┐
//!        ↓            ↓                 ↓
//!  RpcBusAdapter  RpcBusAdapter   LivenessBusAdapter
//!  (service 1)    (service N)     (device)
//!        │            │                 │
//!        └────────────┴──→ EventSink ←──┘
//! ```
//!
//! Each engine and the monitor run in their own task and own their state.
//! The container only holds their handles.

use anyhow::{Context, Result};
use mb_01_rpc_correlation::{
    RpcApi, RpcBusAdapter, RpcConfig, RpcCorrelationEngine, RpcServiceHandle,
};
use mb_02_liveness_monitor::{
    LivenessApi, LivenessBusAdapter, LivenessConfig, LivenessHandle, LivenessMonitor,
};
use mos_telemetry::PENDING_REQUESTS;
use shared_bus::MessageTransport;
use shared_types::{EventSink, TimeSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::adapters::{DeviceSimulator, SimulatorHandle};
use crate::container::client::BridgeClient;
use crate::container::config::BridgeConfig;

/// Running engines, monitor and (in loopback mode) simulator.
pub struct BridgeContainer {
    client: Arc<BridgeClient>,
    services: BTreeMap<String, RpcServiceHandle>,
    liveness: LivenessHandle,
    liveness_node: String,
    simulator: Option<SimulatorHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeContainer {
    /// Validate `config` and spawn everything it describes.
    ///
    /// Must be called from inside a tokio runtime.
    #[instrument(skip_all, fields(device = %config.identity.device_id))]
    pub fn start(
        config: &BridgeConfig,
        transport: Arc<dyn MessageTransport>,
        sink: Arc<dyn EventSink>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        config.validate().context("invalid bridge configuration")?;
        let qos = config.transport.qos()?;
        let device_id = &config.identity.device_id;

        let client = Arc::new(BridgeClient::new(
            config.identity.self_id.clone(),
            device_id.clone(),
            transport.clone(),
            sink.clone(),
        ));
        let mut tasks = Vec::new();

        let mut services = BTreeMap::new();
        let updates = config.rpc.subscribe_updates.then_some(&config.namespace);
        for service in &config.rpc.services {
            let rpc_config = RpcConfig::new(client.self_id(), device_id.clone(), service.clone())
                .with_timeout_ms(config.rpc.timeout_ms)
                .with_sweep_interval_ms(config.rpc.sweep_interval_ms)
                .with_qos(qos, config.transport.retain);
            let engine =
                RpcCorrelationEngine::new(rpc_config, transport.clone(), sink.clone(), time.clone())
                    .with_context(|| format!("building engine for service {}", service))?;
            let (handle, task) = RpcBusAdapter::spawn(engine, transport.clone(), updates)
                .with_context(|| format!("subscribing service {}", service))?;

            client.register(handle.node_id());
            services.insert(service.clone(), handle);
            tasks.push(task);
        }

        let liveness_config = LivenessConfig::new(device_id.clone())
            .with_namespace(config.namespace.clone())
            .with_watchdog(config.liveness.watchdog_secs)
            .with_settings(config.liveness.settings);
        let liveness_node = liveness_config.node_id();
        let monitor = LivenessMonitor::new(liveness_config, sink, time)
            .context("building liveness monitor")?;
        let (liveness, task) = LivenessBusAdapter::spawn(monitor, transport.clone(), qos)
            .context("subscribing heartbeat channels")?;
        client.register(&liveness_node);
        tasks.push(task);

        let simulator = if config.simulator.enabled {
            let (handle, task) = DeviceSimulator::spawn(
                device_id,
                config.namespace.clone(),
                transport,
                Duration::from_millis(config.simulator.heartbeat_interval_ms),
            )
            .context("starting device simulator")?;
            tasks.push(task);
            Some(handle)
        } else {
            None
        };

        info!(
            services = services.len(),
            watchdog_secs = config.liveness.watchdog_secs,
            simulated = simulator.is_some(),
            "Bridge started"
        );

        Ok(Self {
            client,
            services,
            liveness,
            liveness_node,
            simulator,
            tasks,
        })
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    /// Handle of the engine for `service`.
    pub fn service(&self, service: &str) -> Option<&RpcServiceHandle> {
        self.services.get(service)
    }

    /// Configured service names, sorted.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    pub fn liveness(&self) -> &LivenessHandle {
        &self.liveness
    }

    pub fn simulator(&self) -> Option<&SimulatorHandle> {
        self.simulator.as_ref()
    }

    /// Pending requests across every engine. Also refreshes the
    /// `mos_rpc_pending_requests` gauge.
    pub async fn pending_total(&self) -> usize {
        let mut total = 0;
        for handle in self.services.values() {
            match handle.pending_count().await {
                Ok(n) => total += n,
                Err(e) => warn!(node = %handle.node_id(), error = %e, "Engine not answering"),
            }
        }
        PENDING_REQUESTS.set(i64::try_from(total).unwrap_or(i64::MAX));
        total
    }

    /// Stop every task and wait for it to finish. Pending requests are
    /// discarded without per-entry events.
    pub async fn shutdown(self) {
        info!("Shutting down bridge");

        if let Some(simulator) = &self.simulator {
            simulator.shutdown();
        }
        for handle in self.services.values() {
            if let Err(e) = handle.shutdown().await {
                warn!(node = %handle.node_id(), error = %e, "Engine already stopped");
            }
            self.client.deregister(handle.node_id());
        }
        if let Err(e) = self.liveness.shutdown().await {
            warn!(device = %self.liveness.device_id(), error = %e, "Monitor already stopped");
        }
        self.client.deregister(&self.liveness_node);

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Task ended abnormally");
            }
        }
        info!("Bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{InMemoryBroker, TokioClock};
    use shared_types::{NodeStatus, RecordingSink};

    fn config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.identity.self_id = "n1".into();
        config.identity.device_id = "dev".into();
        config.rpc.services = vec!["Temp".into(), "Relay".into()];
        config.simulator.enabled = false;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_registers_every_node() {
        let broker = Arc::new(InMemoryBroker::new());
        let sink = Arc::new(RecordingSink::new());
        let container = BridgeContainer::start(
            &config(),
            broker.clone(),
            sink.clone(),
            Arc::new(TokioClock::new()),
        )
        .unwrap();

        assert_eq!(container.service_names(), vec!["Relay", "Temp"]);
        assert_eq!(
            container.client().nodes(),
            vec!["dev/Relay", "dev/Temp", "dev/liveness"]
        );
        assert!(sink
            .statuses()
            .iter()
            .all(|(_, status)| *status == NodeStatus::connected()));
        assert!(container.simulator().is_none());

        container.shutdown().await;
        assert!(broker.registry().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = config();
        config.rpc.timeout_ms = 0;
        let result = BridgeContainer::start(
            &config,
            Arc::new(InMemoryBroker::new()),
            Arc::new(RecordingSink::new()),
            Arc::new(TokioClock::new()),
        );
        assert!(result.is_err());
    }
}
