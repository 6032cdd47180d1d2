//! Per-engine counters
//!
//! Thread-safe counters readable from outside the engine's task.

use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome counters for one engine instance.
#[derive(Debug, Default)]
pub struct RpcStats {
    /// Requests accepted by `submit`
    pub submitted: AtomicU64,
    /// Requests whose publish was rejected by the transport
    pub publish_failures: AtomicU64,
    /// Replies carrying a `result`
    pub succeeded: AtomicU64,
    /// Replies carrying an `error` (code 400)
    pub remote_errors: AtomicU64,
    /// Entries evicted by age (code 408)
    pub timeouts: AtomicU64,
    /// Entries evicted because the transport was down (code 503)
    pub transport_evictions: AtomicU64,
    /// Replies for ids not in the table (code 412)
    pub unknown_ids: AtomicU64,
    /// Replies without an id (code 406)
    pub missing_ids: AtomicU64,
    /// Undecodable replies or replies with neither/both result and error
    pub malformed: AtomicU64,
    /// Entries discarded by flush or close
    pub flushed: AtomicU64,
}

impl RpcStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RpcStatsSnapshot {
        RpcStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_evictions: self.transport_evictions.load(Ordering::Relaxed),
            unknown_ids: self.unknown_ids.load(Ordering::Relaxed),
            missing_ids: self.missing_ids.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RpcStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RpcStatsSnapshot {
    pub submitted: u64,
    pub publish_failures: u64,
    pub succeeded: u64,
    pub remote_errors: u64,
    pub timeouts: u64,
    pub transport_evictions: u64,
    pub unknown_ids: u64,
    pub missing_ids: u64,
    pub malformed: u64,
    pub flushed: u64,
}

impl RpcStatsSnapshot {
    /// Requests that reached a terminal outcome.
    pub fn resolved(&self) -> u64 {
        self.succeeded
            + self.remote_errors
            + self.timeouts
            + self.transport_evictions
            + self.flushed
    }
}
