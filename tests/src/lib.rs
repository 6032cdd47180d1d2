//! # MOS Bridge Test Suite
//!
//! Cross-crate flows over the in-memory broker, with tokio time paused so
//! sweeps and watchdog deadlines fire deterministically.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Broker, sink and engine/monitor builders
//! └── integration/
//!     ├── rpc_flows.rs      # Request/reply correlation
//!     ├── liveness_flows.rs # Heartbeats and the watchdog
//!     └── bridge_flows.rs   # Full runtime with the simulated device
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mb-tests
//! cargo test -p mb-tests integration::rpc_flows::
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod integration;
