//! Shared test fixtures.

use mb_01_rpc_correlation::{RpcBusAdapter, RpcConfig, RpcCorrelationEngine, RpcServiceHandle};
use mb_02_liveness_monitor::{LivenessBusAdapter, LivenessConfig, LivenessHandle, LivenessMonitor};
use serde_json::Value;
use shared_bus::{InMemoryBroker, MessageTransport, QoS, Subscription, TokioClock};
use shared_types::{topics, BroadcastNamespace, NodeOutput, OutputKind, RecordingSink, WireRequest};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const SELF_ID: &str = "n1";
pub const DEVICE: &str = "dev";

/// Broker plus recording sink shared by everything a test spawns.
pub struct Rig {
    pub broker: Arc<InMemoryBroker>,
    pub sink: Arc<RecordingSink>,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            broker: Arc::new(InMemoryBroker::new()),
            sink: Arc::new(RecordingSink::new()),
        }
    }

    /// Spawn an engine for `service`, subscribed to its update broadcasts.
    pub fn spawn_service(
        &self,
        service: &str,
        timeout_ms: u64,
    ) -> (RpcServiceHandle, JoinHandle<()>) {
        let config = RpcConfig::new(SELF_ID, DEVICE, service).with_timeout_ms(timeout_ms);
        let engine = RpcCorrelationEngine::new(
            config,
            self.broker.clone(),
            self.sink.clone(),
            Arc::new(TokioClock::new()),
        )
        .unwrap();
        RpcBusAdapter::spawn(engine, self.broker.clone(), Some(&BroadcastNamespace::default()))
            .unwrap()
    }

    pub fn spawn_monitor(&self, watchdog_secs: u64) -> (LivenessHandle, JoinHandle<()>) {
        let monitor = LivenessMonitor::new(
            LivenessConfig::new(DEVICE).with_watchdog(watchdog_secs),
            self.sink.clone(),
            Arc::new(TokioClock::new()),
        )
        .unwrap();
        LivenessBusAdapter::spawn(monitor, self.broker.clone(), QoS::AtMostOnce).unwrap()
    }

    /// Subscription seeing every request sent to the device.
    pub fn device_requests(&self) -> Subscription {
        self.broker
            .subscribe(&format!("{}/rpc/#", DEVICE), QoS::AtMostOnce, "device")
            .unwrap()
    }

    /// Publish a raw reply as the device would for `service`.
    pub fn reply(&self, service: &str, body: &str) {
        let topic = topics::rpc_reply_topic(SELF_ID, DEVICE, service);
        self.broker
            .publish(&topic, body.as_bytes().to_vec(), QoS::AtMostOnce, false)
            .unwrap();
    }

    pub fn sysinfo(&self, body: &str) {
        let topic = topics::sysinfo_topic(&BroadcastNamespace::default(), DEVICE);
        self.publish(&topic, body);
    }

    pub fn info(&self, body: &str) {
        let topic = topics::info_topic(&BroadcastNamespace::default(), DEVICE);
        self.publish(&topic, body);
    }

    pub fn update(&self, service: &str, body: &str) {
        let topic = topics::update_topic(&BroadcastNamespace::default(), DEVICE, service);
        self.publish(&topic, body);
    }

    fn publish(&self, topic: &str, body: &str) {
        self.broker
            .publish(topic, body.as_bytes().to_vec(), QoS::AtMostOnce, false)
            .unwrap();
    }

    pub fn of_kind(&self, kind: OutputKind) -> Vec<NodeOutput> {
        self.sink.of_kind(kind)
    }

    /// Codes of every error and warning output, in delivery order.
    pub fn codes(&self) -> Vec<u16> {
        self.sink.outputs().iter().filter_map(NodeOutput::code).collect()
    }

    /// `online` field of every status output, in delivery order.
    pub fn online_events(&self) -> Vec<Option<bool>> {
        self.of_kind(OutputKind::Online)
            .iter()
            .map(|o| o.payload["online"].as_bool())
            .collect()
    }
}

/// Let spawned tasks drain their queues.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Decode a request captured by [`Rig::device_requests`].
pub async fn next_request(requests: &mut Subscription) -> (String, WireRequest) {
    let msg = requests.recv().await.unwrap();
    let request: WireRequest = serde_json::from_slice(&msg.payload).unwrap();
    (msg.topic, request)
}

pub fn json(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}
