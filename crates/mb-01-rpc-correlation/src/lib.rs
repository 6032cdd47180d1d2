//! # MB-01 RPC Correlation
//!
//! Request/reply on top of publish/subscribe: correlation ids, a pending
//! request table and a periodic sweep that evicts timed-out or orphaned
//! requests.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `RpcConfig`, `PendingRequestTable`
//! - **Ports Layer** (`ports/`): `RpcApi` (driving), transport/sink/time
//!   (driven)
//! - **Service Layer** (`service/`): `RpcCorrelationEngine`, synchronous
//!   owned state
//! - **Adapters Layer** (`adapters/`): `RpcBusAdapter` task and its
//!   `RpcServiceHandle`
//!
//! ## Result codes
//!
//! | Code | Kind    | Meaning |
//! |------|---------|---------|
//! | 400  | error   | remote method failed; remote error forwarded verbatim |
//! | 406  | error   | reply without id |
//! | 408  | error   | no reply within the timeout |
//! | 412  | warning | reply for an id that is not pending |
//! | 503  | error   | transport down at sweep time |
//!
//! ## Usage
//!
//! ```ignore
//! let engine = RpcCorrelationEngine::new(
//!     RpcConfig::new("n1", "dev", "Temp"),
//!     transport.clone(),
//!     sink,
//!     Arc::new(TokioClock::new()),
//! )?;
//! let (handle, _task) = RpcBusAdapter::spawn(engine, transport, None)?;
//! handle.read().await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{RpcBusAdapter, RpcCommand, RpcServiceHandle};
pub use domain::{PendingRequest, PendingRequestTable, RpcConfig};
pub use error::RpcError;
pub use metrics::{RpcStats, RpcStatsSnapshot};
pub use ports::RpcApi;
pub use service::RpcCorrelationEngine;
