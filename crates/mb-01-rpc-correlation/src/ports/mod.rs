//! Ports layer

pub mod inbound;
pub mod outbound;

pub use inbound::RpcApi;
pub use outbound::{EventSink, MessageTransport, TimeSource};
