//! # Output Router
//!
//! Event sink of the runtime. Every output is logged by slot, counted in the
//! Prometheus registry and forwarded to whoever holds the receiving end
//! (the console, or a test).

use mos_telemetry::{DEVICE_ONLINE, HEARTBEATS, RPC_OUTPUTS};
use shared_types::{EventSink, NodeOutput, NodeStatus, OutputKind, OutputSlot};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What the router forwards downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedEvent {
    Output(NodeOutput),
    Status { node_id: String, status: NodeStatus },
}

pub struct OutputRouter {
    forward: mpsc::UnboundedSender<RoutedEvent>,
}

impl OutputRouter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RoutedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { forward: tx }, rx)
    }

    fn record(output: &NodeOutput) {
        RPC_OUTPUTS.with_label_values(&[output.kind.as_str()]).inc();
        match output.kind {
            OutputKind::Online => {
                // device id is the node id up to the first '/'
                let device = output.node_id.split('/').next().unwrap_or(&output.node_id);
                if let Some(online) = output.payload["online"].as_bool() {
                    DEVICE_ONLINE
                        .with_label_values(&[device])
                        .set(if online { 1.0 } else { 0.0 });
                }
            }
            OutputKind::Success if is_heartbeat(&output.topic) => {
                HEARTBEATS.with_label_values(&[output.topic.as_str()]).inc();
            }
            _ => {}
        }
    }

    fn forward(&self, event: RoutedEvent) {
        if self.forward.send(event).is_err() {
            debug!("[OutputRouter] Receiver dropped, output discarded");
        }
    }
}

fn is_heartbeat(topic: &str) -> bool {
    topic == shared_types::topics::SYSINFO_LEAF || topic == shared_types::topics::INFO_LEAF
}

impl EventSink for OutputRouter {
    fn deliver(&self, output: NodeOutput) {
        match output.slot() {
            OutputSlot::Success => {
                debug!(node = %output.node_id, topic = %output.topic, "success")
            }
            OutputSlot::Error => warn!(
                node = %output.node_id,
                topic = %output.topic,
                code = ?output.code(),
                kind = output.kind.as_str(),
                "error"
            ),
            OutputSlot::Status => {
                info!(node = %output.node_id, payload = %output.payload, "status")
            }
            OutputSlot::Log => debug!(node = %output.node_id, topic = %output.topic, "log"),
        }
        Self::record(&output);
        self.forward(RoutedEvent::Output(output));
    }

    fn set_status(&self, node_id: &str, status: NodeStatus) {
        debug!(node = node_id, text = %status.text, "status indicator");
        self.forward(RoutedEvent::Status {
            node_id: node_id.to_string(),
            status,
        });
    }
}
