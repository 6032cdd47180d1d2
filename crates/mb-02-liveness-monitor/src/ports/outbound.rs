//! Outbound Ports (Driven Ports)

pub use shared_bus::MessageTransport;
pub use shared_types::{EventSink, TimeSource};
