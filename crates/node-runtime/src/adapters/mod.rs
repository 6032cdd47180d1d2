//! # Runtime Adapters
//!
//! - `output_router` - Event sink feeding logs, metrics and the console
//! - `device_simulator` - Loopback device for running without a broker

pub mod device_simulator;
pub mod output_router;

pub use device_simulator::{DeviceSimulator, SimulatorHandle};
pub use output_router::{OutputRouter, RoutedEvent};
