//! Cross-crate integration flows.

pub mod bridge_flows;
pub mod liveness_flows;
pub mod rpc_flows;
