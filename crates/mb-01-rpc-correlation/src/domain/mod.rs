//! Domain layer: pure state, no I/O.

pub mod config;
pub mod pending;

pub use config::RpcConfig;
pub use pending::{PendingRequest, PendingRequestTable};
