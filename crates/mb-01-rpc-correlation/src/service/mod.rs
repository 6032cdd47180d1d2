//! Service layer

pub mod engine;

pub use engine::{RpcCorrelationEngine, READ_METHOD, WRITE_METHOD};
