//! # Event Sink Contract
//!
//! Tagged results emitted by the engines for downstream routing.
//!
//! Every output carries a kind; the kind decides which output slot it lands
//! on so downstream wiring can react selectively:
//!
//! | Kind      | Slot    |
//! |-----------|---------|
//! | success   | success |
//! | error     | error   |
//! | warning   | error   |
//! | online    | status  |
//! | log       | log     |

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Kind tag of an emitted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Success,
    Error,
    Warning,
    Online,
    Log,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Success => "success",
            OutputKind::Error => "error",
            OutputKind::Warning => "warning",
            OutputKind::Online => "online",
            OutputKind::Log => "log",
        }
    }
}

/// Independent output slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSlot {
    Success,
    Error,
    Status,
    Log,
}

impl OutputSlot {
    /// Positional index of the slot, in wiring order.
    pub fn index(&self) -> usize {
        match self {
            OutputSlot::Success => 0,
            OutputSlot::Error => 1,
            OutputSlot::Status => 2,
            OutputSlot::Log => 3,
        }
    }
}

/// A tagged message delivered to the Event Sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Id of the node (engine or monitor instance) that produced it.
    pub node_id: String,
    pub kind: OutputKind,
    /// Short routing topic, e.g. the RPC method or heartbeat channel.
    pub topic: String,
    pub payload: Value,
}

impl NodeOutput {
    pub fn success(node_id: &str, topic: impl Into<String>, payload: Value) -> Self {
        Self::new(node_id, OutputKind::Success, topic, payload)
    }

    /// Error output with a `{code, message, ..extra}` payload.
    pub fn error(
        node_id: &str,
        topic: impl Into<String>,
        code: u16,
        message: &str,
        extra: Map<String, Value>,
    ) -> Self {
        Self::new(
            node_id,
            OutputKind::Error,
            topic,
            coded_payload(code, message, extra),
        )
    }

    /// Warning output with a `{code, message, ..extra}` payload.
    pub fn warning(
        node_id: &str,
        topic: impl Into<String>,
        code: u16,
        message: &str,
        extra: Map<String, Value>,
    ) -> Self {
        Self::new(
            node_id,
            OutputKind::Warning,
            topic,
            coded_payload(code, message, extra),
        )
    }

    /// Liveness output; `None` reports a still-unknown state.
    pub fn online(node_id: &str, online: Option<bool>) -> Self {
        Self::new(node_id, OutputKind::Online, "online", json!({ "online": online }))
    }

    pub fn log(node_id: &str, topic: impl Into<String>, payload: Value) -> Self {
        Self::new(node_id, OutputKind::Log, topic, payload)
    }

    fn new(node_id: &str, kind: OutputKind, topic: impl Into<String>, payload: Value) -> Self {
        Self {
            node_id: node_id.to_string(),
            kind,
            topic: topic.into(),
            payload,
        }
    }

    /// Slot this output is routed to.
    pub fn slot(&self) -> OutputSlot {
        match self.kind {
            OutputKind::Success => OutputSlot::Success,
            OutputKind::Error | OutputKind::Warning => OutputSlot::Error,
            OutputKind::Online => OutputSlot::Status,
            OutputKind::Log => OutputSlot::Log,
        }
    }

    /// Result code for error and warning outputs.
    pub fn code(&self) -> Option<u16> {
        self.payload
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
    }
}

fn coded_payload(code: u16, message: &str, extra: Map<String, Value>) -> Value {
    let mut obj = Map::new();
    obj.insert("code".to_string(), json!(code));
    obj.insert("message".to_string(), json!(message));
    obj.extend(extra);
    Value::Object(obj)
}

/// Colour of the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFill {
    Green,
    Red,
    Yellow,
    Grey,
}

/// Shape of the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusShape {
    Dot,
    Ring,
}

/// Status indicator shown next to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub fill: StatusFill,
    pub shape: StatusShape,
    pub text: String,
}

impl NodeStatus {
    pub fn connected() -> Self {
        Self::new(StatusFill::Green, StatusShape::Dot, "connected")
    }

    pub fn disconnected() -> Self {
        Self::new(StatusFill::Red, StatusShape::Ring, "disconnected")
    }

    pub fn online() -> Self {
        Self::new(StatusFill::Green, StatusShape::Dot, "online")
    }

    pub fn offline() -> Self {
        Self::new(StatusFill::Red, StatusShape::Ring, "offline")
    }

    fn new(fill: StatusFill, shape: StatusShape, text: &str) -> Self {
        Self {
            fill,
            shape,
            text: text.to_string(),
        }
    }
}

/// Receiver of everything the engines emit.
pub trait EventSink: Send + Sync {
    /// Deliver a tagged output.
    fn deliver(&self, output: NodeOutput);

    /// Update the status indicator of a node.
    fn set_status(&self, _node_id: &str, _status: NodeStatus) {}
}

/// Sink that records everything it receives, for tests and inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    outputs: Mutex<Vec<NodeOutput>>,
    statuses: Mutex<Vec<(String, NodeStatus)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all outputs so far.
    pub fn outputs(&self) -> Vec<NodeOutput> {
        self.outputs.lock().clone()
    }

    /// Drain recorded outputs.
    pub fn take(&self) -> Vec<NodeOutput> {
        std::mem::take(&mut *self.outputs.lock())
    }

    pub fn of_kind(&self, kind: OutputKind) -> Vec<NodeOutput> {
        self.outputs
            .lock()
            .iter()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect()
    }

    pub fn statuses(&self) -> Vec<(String, NodeStatus)> {
        self.statuses.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.outputs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, output: NodeOutput) {
        self.outputs.lock().push(output);
    }

    fn set_status(&self, node_id: &str, status: NodeStatus) {
        self.statuses.lock().push((node_id.to_string(), status));
    }
}
