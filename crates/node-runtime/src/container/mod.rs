//! # Bridge Container
//!
//! Configuration, client registration and the container owning every
//! running engine and monitor.
//!
//! - One RPC correlation engine per configured service
//! - One liveness monitor for the device
//! - Engines never share state; they only share the transport

pub mod client;
pub mod config;
pub mod subsystems;

pub use client::BridgeClient;
pub use config::{BridgeConfig, ConfigError};
pub use subsystems::BridgeContainer;
