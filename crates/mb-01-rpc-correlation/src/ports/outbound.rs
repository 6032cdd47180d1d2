//! Outbound Ports (Driven Ports)
//!
//! What the engine depends on: the shared transport, the event sink and a
//! time source. Defined in the shared crates so every engine and monitor
//! agrees on one contract.

pub use shared_bus::MessageTransport;
pub use shared_types::{EventSink, TimeSource};
