//! # Topic Namer
//!
//! Pure functions mapping device identity, service and method names to the
//! transport topics used by the device firmware.
//!
//! ## Topic Scheme
//!
//! ```text
//! request:          <deviceId>/rpc/<service>.<Method>
//! reply-subscribe:  <selfId>_<deviceId>_<service>/rpc
//! update:           <domain>/<bus>/<version>/<broadcast>/<deviceId>/<service>.Update
//! sysinfo:          <domain>/<bus>/<version>/<broadcast>/<deviceId>/SysInfo
//! info:             <domain>/<bus>/<version>/<broadcast>/<deviceId>/Info
//! ```
//!
//! Inputs are assumed to be validated already (no separators inside
//! segments); see `node-runtime` configuration validation.

use serde::{Deserialize, Serialize};

/// Path segment separating the device from the RPC channel.
pub const RPC_SEGMENT: &str = "rpc";

/// Suffix of broadcast update topics.
pub const UPDATE_SUFFIX: &str = "Update";

/// Leaf of the periodic system-info heartbeat topic.
pub const SYSINFO_LEAF: &str = "SysInfo";

/// Leaf of the general info heartbeat topic.
pub const INFO_LEAF: &str = "Info";

/// Namespace segments prefixing every broadcast topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastNamespace {
    pub domain: String,
    pub bus: String,
    pub version: String,
    pub broadcast: String,
}

impl Default for BroadcastNamespace {
    fn default() -> Self {
        Self {
            domain: "mos".to_string(),
            bus: "main".to_string(),
            version: "v1".to_string(),
            broadcast: "broadcast".to_string(),
        }
    }
}

impl BroadcastNamespace {
    fn device_prefix(&self, device_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.domain, self.bus, self.version, self.broadcast, device_id
        )
    }
}

/// Full RPC method name as carried on the wire: `<service>.<Method>`.
pub fn rpc_method(service: &str, method: &str) -> String {
    format!("{}.{}", service, method)
}

/// Topic a request for `service.method` is published to.
pub fn rpc_request_topic(device_id: &str, service: &str, method: &str) -> String {
    format!(
        "{}/{}/{}",
        device_id,
        RPC_SEGMENT,
        rpc_method(service, method)
    )
}

/// Reply routing prefix, sent as the request's `src` field.
///
/// Unique per (engine instance, device, service) so replies only reach the
/// engine that issued the request.
pub fn rpc_reply_source(self_id: &str, device_id: &str, service: &str) -> String {
    format!("{}_{}_{}", self_id, device_id, service)
}

/// Topic the device publishes replies to for a given reply source.
pub fn rpc_reply_topic(self_id: &str, device_id: &str, service: &str) -> String {
    format!(
        "{}/{}",
        rpc_reply_source(self_id, device_id, service),
        RPC_SEGMENT
    )
}

/// Broadcast channel for unsolicited `service` updates.
pub fn update_topic(ns: &BroadcastNamespace, device_id: &str, service: &str) -> String {
    format!(
        "{}/{}.{}",
        ns.device_prefix(device_id),
        service,
        UPDATE_SUFFIX
    )
}

/// Periodic system-info heartbeat channel.
pub fn sysinfo_topic(ns: &BroadcastNamespace, device_id: &str) -> String {
    format!("{}/{}", ns.device_prefix(device_id), SYSINFO_LEAF)
}

/// General info heartbeat channel.
pub fn info_topic(ns: &BroadcastNamespace, device_id: &str) -> String {
    format!("{}/{}", ns.device_prefix(device_id), INFO_LEAF)
}
