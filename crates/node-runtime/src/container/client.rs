//! # Bridge Client
//!
//! The configured connection every service node attaches to. Holds the
//! client and device identity, tracks which nodes are registered and
//! answers connectivity by asking the transport.

use parking_lot::Mutex;
use shared_bus::MessageTransport;
use shared_types::{EventSink, NodeStatus};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub struct BridgeClient {
    self_id: String,
    device_id: String,
    transport: Arc<dyn MessageTransport>,
    sink: Arc<dyn EventSink>,
    nodes: Mutex<BTreeSet<String>>,
}

impl BridgeClient {
    pub fn new(
        self_id: impl Into<String>,
        device_id: impl Into<String>,
        transport: Arc<dyn MessageTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            device_id: device_id.into(),
            transport,
            sink,
            nodes: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Attach a node. Its status turns "connected" if the transport is up.
    /// Returns false if the node was already registered.
    pub fn register(&self, node_id: &str) -> bool {
        let added = self.nodes.lock().insert(node_id.to_string());
        debug!(node = node_id, added, "[BridgeClient] register");
        if added && self.connected() {
            self.sink.set_status(node_id, NodeStatus::connected());
        }
        added
    }

    pub fn deregister(&self, node_id: &str) -> bool {
        let removed = self.nodes.lock().remove(node_id);
        debug!(node = node_id, removed, "[BridgeClient] deregister");
        removed
    }

    pub fn connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Registered node ids, sorted.
    pub fn nodes(&self) -> Vec<String> {
        self.nodes.lock().iter().cloned().collect()
    }
}
