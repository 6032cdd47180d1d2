//! Inbound Ports (Driving Ports)
//!
//! The API user-facing code calls to drive an engine.

use async_trait::async_trait;
use serde_json::{json, Value};
use shared_types::CorrelationId;

use crate::error::RpcError;
use crate::metrics::RpcStatsSnapshot;
use crate::service::{READ_METHOD, WRITE_METHOD};

/// Request/reply API of one service on one device.
///
/// Results are not returned here: they arrive on the event sink tagged with
/// the request's method.
#[async_trait]
pub trait RpcApi: Send + Sync {
    /// Publish `method` with `args`; returns the allocated correlation id.
    async fn submit(&self, method: &str, args: Value) -> Result<CorrelationId, RpcError>;

    async fn read(&self) -> Result<CorrelationId, RpcError> {
        self.submit(READ_METHOD, json!({})).await
    }

    async fn write(&self, args: Value) -> Result<CorrelationId, RpcError> {
        self.submit(WRITE_METHOD, args).await
    }

    async fn call(&self, method: &str, args: Value) -> Result<CorrelationId, RpcError> {
        self.submit(method, args).await
    }

    /// Discard pending requests without per-entry events.
    async fn flush(&self) -> Result<usize, RpcError>;

    async fn pending_count(&self) -> Result<usize, RpcError>;

    fn stats(&self) -> RpcStatsSnapshot;

    /// Stop the engine; pending requests are discarded silently.
    async fn shutdown(&self) -> Result<(), RpcError>;
}
