//! Pending-Request Table
//!
//! In-flight requests of one engine, keyed by correlation id. Owned by
//! exactly one engine; never shared.

use shared_types::{CorrelationId, Timestamp, WireRequest};
use std::collections::HashMap;

use crate::error::RpcError;

/// A request that has been published and is awaiting its reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub id: CorrelationId,
    /// The request exactly as published
    pub original_payload: WireRequest,
    pub enqueued_at: Timestamp,
}

impl PendingRequest {
    pub fn new(original_payload: WireRequest, enqueued_at: Timestamp) -> Self {
        Self {
            id: original_payload.id,
            original_payload,
            enqueued_at,
        }
    }

    /// Wire method, `<service>.<Method>`.
    pub fn method(&self) -> &str {
        &self.original_payload.method
    }

    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.enqueued_at)
    }

    pub fn is_expired(&self, now: Timestamp, timeout_ms: u64) -> bool {
        self.age(now) >= timeout_ms
    }
}

/// Correlation id → pending request.
#[derive(Debug, Default)]
pub struct PendingRequestTable {
    entries: HashMap<CorrelationId, PendingRequest>,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. Ids are unique; an id already present is rejected
    /// and the existing entry is left untouched.
    pub fn insert(&mut self, request: PendingRequest) -> Result<(), RpcError> {
        if self.entries.contains_key(&request.id) {
            return Err(RpcError::DuplicateId(request.id));
        }
        self.entries.insert(request.id, request);
        Ok(())
    }

    pub fn remove(&mut self, id: &CorrelationId) -> Option<PendingRequest> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outstanding ids, ascending.
    pub fn ids(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<CorrelationId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Remove and return entries whose age has reached `timeout_ms`,
    /// ascending by id. Younger entries stay.
    pub fn evict_expired(&mut self, now: Timestamp, timeout_ms: u64) -> Vec<PendingRequest> {
        let expired: Vec<CorrelationId> = self
            .entries
            .values()
            .filter(|r| r.is_expired(now, timeout_ms))
            .map(|r| r.id)
            .collect();

        let mut evicted: Vec<PendingRequest> = expired
            .iter()
            .filter_map(|id| self.entries.remove(id))
            .collect();
        evicted.sort_by_key(|r| r.id);
        evicted
    }

    /// Remove and return every entry, ascending by id.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        let mut all: Vec<PendingRequest> = self.entries.drain().map(|(_, r)| r).collect();
        all.sort_by_key(|r| r.id);
        all
    }

    /// Discard every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }
}
