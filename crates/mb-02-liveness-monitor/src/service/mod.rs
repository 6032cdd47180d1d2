//! Service layer

pub mod monitor;

pub use monitor::LivenessMonitor;
