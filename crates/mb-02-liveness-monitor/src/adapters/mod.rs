//! Adapters layer

pub mod bus_adapter;

pub use bus_adapter::{LivenessBusAdapter, LivenessCommand, LivenessHandle};
