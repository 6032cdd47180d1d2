//! Ports layer

pub mod inbound;
pub mod outbound;

pub use inbound::LivenessApi;
pub use outbound::{EventSink, MessageTransport, TimeSource};
