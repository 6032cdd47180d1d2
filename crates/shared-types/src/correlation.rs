//! Correlation ID for request/reply matching.
//!
//! Ids are plain integers issued by a per-engine counter starting at 1.
//! They are never reused within a process lifetime and travel on the wire
//! as JSON numbers; the decimal string form is accepted on input.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Correlation ID linking a request to its eventual reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// The first id handed out by a fresh generator.
    pub const FIRST: CorrelationId = CorrelationId(1);

    /// Wrap a raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the underlying integer.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Read an id out of a wire `id` field.
    ///
    /// Accepts non-negative integers and their decimal string form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_u64().map(Self),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<CorrelationId> for u64 {
    fn from(id: CorrelationId) -> Self {
        id.0
    }
}

/// Monotonic id source owned by exactly one engine.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    next: u64,
}

impl CorrelationIdGenerator {
    pub fn new() -> Self {
        Self {
            next: CorrelationId::FIRST.0,
        }
    }

    /// Issue the next id.
    pub fn next_id(&mut self) -> CorrelationId {
        let id = CorrelationId(self.next);
        // u64 exhaustion is not reachable in practice
        self.next = self.next.saturating_add(1);
        id
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
