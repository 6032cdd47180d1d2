//! RPC Correlation Engine
//!
//! Turns the fire-and-forget transport into a request/reply channel with
//! per-request timeouts and at-most-one delivery per request.
//!
//! The engine is plain owned state (`&mut self` everywhere). Exactly one task
//! drives it, so reply handling, sweeps and user commands never interleave.
//!
//! ## Sweep scheduling
//!
//! The sweep deadline is derived state: it is recomputed after every table
//! mutation and is `Some` exactly when the table is non-empty.

use serde_json::{json, Map, Value};
use shared_bus::MessageTransport;
use shared_types::wire::{decode_json, decode_reply};
use shared_types::{
    codes, CorrelationId, CorrelationIdGenerator, EventSink, NodeOutput, ParsedReply, ReplyBody,
    ReplyId, TimeSource, Timestamp, WireRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{PendingRequest, PendingRequestTable, RpcConfig};
use crate::error::RpcError;
use crate::metrics::RpcStats;

/// Method name used by `read`.
pub const READ_METHOD: &str = "Read";

/// Method name used by `write`.
pub const WRITE_METHOD: &str = "Write";

/// One correlation engine per (client, device, service).
pub struct RpcCorrelationEngine {
    config: RpcConfig,
    node_id: String,
    transport: Arc<dyn MessageTransport>,
    sink: Arc<dyn EventSink>,
    time: Arc<dyn TimeSource>,
    ids: CorrelationIdGenerator,
    table: PendingRequestTable,
    sweep_due: Option<Timestamp>,
    stats: Arc<RpcStats>,
    closed: bool,
}

impl RpcCorrelationEngine {
    pub fn new(
        config: RpcConfig,
        transport: Arc<dyn MessageTransport>,
        sink: Arc<dyn EventSink>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, RpcError> {
        config.validate()?;
        let node_id = config.node_id();
        Ok(Self {
            config,
            node_id,
            transport,
            sink,
            time,
            ids: CorrelationIdGenerator::new(),
            table: PendingRequestTable::new(),
            sweep_due: None,
            stats: Arc::new(RpcStats::new()),
            closed: false,
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn stats(&self) -> Arc<RpcStats> {
        Arc::clone(&self.stats)
    }

    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        self.table.ids()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the sweep timer is running.
    pub fn sweep_active(&self) -> bool {
        self.sweep_due.is_some()
    }

    /// When the next sweep is due, if one is scheduled.
    pub fn next_sweep_at(&self) -> Option<Timestamp> {
        self.sweep_due
    }

    /// Time left until the next sweep, if one is scheduled.
    pub fn time_until_sweep(&self) -> Option<Duration> {
        self.sweep_due
            .map(|at| Duration::from_millis(at.saturating_sub(self.time.now())))
    }

    /// Publish a request for `method` and record it as pending.
    ///
    /// A publish rejected by the transport is logged and the entry stays
    /// pending; the sweep resolves it (503 while disconnected, 408 once it
    /// ages out). Requests are never resent.
    pub fn submit(&mut self, method: &str, args: Value) -> Result<CorrelationId, RpcError> {
        if self.closed {
            return Err(RpcError::Closed);
        }

        let id = self.ids.next_id();
        let request = WireRequest {
            src: self.config.reply_source(),
            id,
            method: self.config.wire_method(method),
            args,
        };
        let payload = request.encode()?;
        let topic = self.config.request_topic(method);

        self.table.insert(PendingRequest::new(request, self.time.now()))?;
        RpcStats::incr(&self.stats.submitted);
        self.reschedule_sweep();

        match self
            .transport
            .publish(&topic, payload, self.config.qos, self.config.retain)
        {
            Ok(()) => {
                debug!(
                    node = %self.node_id,
                    correlation_id = %id,
                    topic = %topic,
                    "Request published"
                );
            }
            Err(e) => {
                RpcStats::incr(&self.stats.publish_failures);
                warn!(
                    node = %self.node_id,
                    correlation_id = %id,
                    topic = %topic,
                    error = %e,
                    "Request publish failed; left pending"
                );
            }
        }

        Ok(id)
    }

    /// `submit("Read", {})`
    pub fn read(&mut self) -> Result<CorrelationId, RpcError> {
        self.submit(READ_METHOD, json!({}))
    }

    /// `submit("Write", args)`
    pub fn write(&mut self, args: Value) -> Result<CorrelationId, RpcError> {
        self.submit(WRITE_METHOD, args)
    }

    /// Custom method call.
    pub fn call(&mut self, method: &str, args: Value) -> Result<CorrelationId, RpcError> {
        self.submit(method, args)
    }

    /// Handle a payload received on the reply topic.
    pub fn on_reply(&mut self, raw: &[u8]) {
        if self.closed {
            return;
        }

        let parsed = match decode_reply(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                RpcStats::incr(&self.stats.malformed);
                warn!(node = %self.node_id, error = %e, "Discarding reply");
                return;
            }
        };

        match parsed {
            ParsedReply::MissingId => {
                RpcStats::incr(&self.stats.missing_ids);
                warn!(node = %self.node_id, "Reply without id");
                self.sink.deliver(NodeOutput::error(
                    &self.node_id,
                    self.config.service.clone(),
                    codes::ID_MISSING,
                    "id missing",
                    Map::new(),
                ));
            }
            ParsedReply::Malformed { id, reason } => {
                RpcStats::incr(&self.stats.malformed);
                debug!(node = %self.node_id, id = ?id, reason, "Dropping malformed reply");
            }
            ParsedReply::Reply { id, body } => self.complete(id, body),
        }
    }

    fn complete(&mut self, id: ReplyId, body: ReplyBody) {
        let pending = match &id {
            ReplyId::Id(cid) => self.table.remove(cid),
            ReplyId::Invalid(_) => None,
        };

        let Some(pending) = pending else {
            RpcStats::incr(&self.stats.unknown_ids);
            let raw_id = match id {
                ReplyId::Id(cid) => json!(cid.as_u64()),
                ReplyId::Invalid(v) => v,
            };
            warn!(node = %self.node_id, id = %raw_id, "Reply for unknown id");
            let mut extra = Map::new();
            extra.insert("id".to_string(), raw_id);
            self.sink.deliver(NodeOutput::warning(
                &self.node_id,
                self.config.service.clone(),
                codes::UNKNOWN_ID,
                "unknown id",
                extra,
            ));
            return;
        };

        self.reschedule_sweep();
        let age = pending.age(self.time.now());

        match body {
            ReplyBody::Result(result) => {
                RpcStats::incr(&self.stats.succeeded);
                debug!(
                    node = %self.node_id,
                    correlation_id = %pending.id,
                    method = %pending.method(),
                    age_ms = age,
                    "Request completed"
                );
                self.sink.deliver(NodeOutput::success(
                    &self.node_id,
                    pending.method(),
                    result,
                ));
            }
            ReplyBody::Error(error) => {
                RpcStats::incr(&self.stats.remote_errors);
                debug!(
                    node = %self.node_id,
                    correlation_id = %pending.id,
                    method = %pending.method(),
                    "Remote reported error"
                );
                let mut extra = request_fields(&pending);
                extra.insert("error".to_string(), error);
                self.sink.deliver(NodeOutput::error(
                    &self.node_id,
                    pending.method(),
                    codes::REMOTE_ERROR,
                    "remote error",
                    extra,
                ));
            }
        }
    }

    /// Handle an unsolicited broadcast update for this service.
    pub fn on_broadcast_update(&mut self, raw: &[u8]) {
        if self.closed {
            return;
        }
        match decode_json(raw) {
            Ok(payload) => {
                self.sink.deliver(NodeOutput::success(
                    &self.node_id,
                    self.config.wire_method(shared_types::topics::UPDATE_SUFFIX),
                    payload,
                ));
            }
            Err(e) => {
                RpcStats::incr(&self.stats.malformed);
                warn!(node = %self.node_id, error = %e, "Discarding broadcast update");
            }
        }
    }

    /// Evict orphaned and timed-out entries.
    ///
    /// Transport down: every entry goes with 503. Otherwise only entries
    /// aged `>= timeout_ms` go, with 408.
    pub fn sweep(&mut self) {
        if self.closed || self.table.is_empty() {
            self.sweep_due = None;
            return;
        }

        let now = self.time.now();
        if !self.transport.is_connected() {
            let evicted = self.table.drain();
            RpcStats::add(&self.stats.transport_evictions, evicted.len() as u64);
            warn!(
                node = %self.node_id,
                count = evicted.len(),
                "Transport not active; evicting pending requests"
            );
            for pending in evicted {
                self.sink.deliver(NodeOutput::error(
                    &self.node_id,
                    pending.method(),
                    codes::TRANSPORT_INACTIVE,
                    "transport not active",
                    request_fields(&pending),
                ));
            }
        } else {
            let evicted = self.table.evict_expired(now, self.config.timeout_ms);
            RpcStats::add(&self.stats.timeouts, evicted.len() as u64);
            for pending in evicted {
                warn!(
                    node = %self.node_id,
                    correlation_id = %pending.id,
                    method = %pending.method(),
                    age_ms = pending.age(now),
                    "Request timed out"
                );
                self.sink.deliver(NodeOutput::error(
                    &self.node_id,
                    pending.method(),
                    codes::TIMEOUT,
                    "request timed out",
                    request_fields(&pending),
                ));
            }
        }

        self.sweep_due = None;
        self.reschedule_sweep();
    }

    /// Discard all pending entries without per-entry events.
    pub fn flush(&mut self) -> usize {
        let n = self.table.clear();
        RpcStats::add(&self.stats.flushed, n as u64);
        self.reschedule_sweep();
        if n > 0 {
            info!(node = %self.node_id, count = n, "Pending requests flushed");
        }
        n
    }

    /// Shut the engine down: bulk discard, cancel the sweep, refuse further
    /// submits and ignore further replies.
    pub fn close(&mut self) -> usize {
        let n = self.flush();
        self.closed = true;
        self.sweep_due = None;
        info!(node = %self.node_id, discarded = n, "Engine closed");
        n
    }

    fn reschedule_sweep(&mut self) {
        if self.table.is_empty() {
            self.sweep_due = None;
        } else if self.sweep_due.is_none() {
            self.sweep_due = Some(self.time.now() + self.config.sweep_interval_ms);
        }
    }
}

fn request_fields(pending: &PendingRequest) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("id".to_string(), json!(pending.id.as_u64()));
    extra.insert("method".to_string(), json!(pending.method()));
    extra.insert("args".to_string(), pending.original_payload.args.clone());
    extra
}
