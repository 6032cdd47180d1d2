//! # Node Runtime Library
//!
//! Exposes the runtime modules of the `mos-bridge` binary for testing.
//!
//! ## Modules
//!
//! - `container/` - Configuration, client registration, engine container
//! - `adapters/` - Output router (event sink) and loopback device simulator
//! - `console` - Line-oriented command console

pub mod adapters;
pub mod console;
pub mod container;

pub use adapters::{DeviceSimulator, OutputRouter, RoutedEvent, SimulatorHandle};
pub use container::{BridgeClient, BridgeConfig, BridgeContainer, ConfigError};
