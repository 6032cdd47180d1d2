//! Transport adapter for the RPC correlation engine
//!
//! Runs one engine inside one task. Replies, broadcast updates, sweep ticks
//! and user commands are all handled in that task's `select!` loop, so the
//! engine's table is only ever touched by one handler at a time.

use async_trait::async_trait;
use serde_json::Value;
use shared_bus::{MessageTransport, Subscription, TransportMessage};
use shared_types::{topics, BroadcastNamespace, CorrelationId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RpcError;
use crate::metrics::{RpcStats, RpcStatsSnapshot};
use crate::ports::RpcApi;
use crate::service::RpcCorrelationEngine;

const COMMAND_CAPACITY: usize = 64;

/// Commands accepted by the engine task.
#[derive(Debug)]
pub enum RpcCommand {
    Submit {
        method: String,
        args: Value,
        reply: oneshot::Sender<Result<CorrelationId, RpcError>>,
    },
    Flush {
        reply: oneshot::Sender<usize>,
    },
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Owns an engine and its subscriptions.
pub struct RpcBusAdapter {
    engine: RpcCorrelationEngine,
    transport: Arc<dyn MessageTransport>,
    commands: mpsc::Receiver<RpcCommand>,
    replies: Subscription,
    updates: Option<Subscription>,
    subscriber_id: String,
}

impl RpcBusAdapter {
    /// Subscribe the engine's reply topic (and, with a namespace, its
    /// broadcast update topic) and return the adapter plus its handle.
    ///
    /// Subscriptions are in place before the handle exists, so no reply to
    /// a request sent through the handle can be missed.
    pub fn new(
        engine: RpcCorrelationEngine,
        transport: Arc<dyn MessageTransport>,
        updates: Option<&BroadcastNamespace>,
    ) -> Result<(Self, RpcServiceHandle), RpcError> {
        let config = engine.config().clone();
        let subscriber_id = config.reply_source();

        let replies = transport.subscribe(&config.reply_topic(), config.qos, &subscriber_id)?;
        let updates = match updates {
            Some(ns) => {
                let topic = topics::update_topic(ns, &config.device_id, &config.service);
                Some(transport.subscribe(&topic, config.qos, &subscriber_id)?)
            }
            None => None,
        };

        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = RpcServiceHandle {
            node_id: engine.node_id().to_string(),
            commands: tx,
            stats: engine.stats(),
        };

        Ok((
            Self {
                engine,
                transport,
                commands: rx,
                replies,
                updates,
                subscriber_id,
            },
            handle,
        ))
    }

    /// Build and spawn in one step.
    pub fn spawn(
        engine: RpcCorrelationEngine,
        transport: Arc<dyn MessageTransport>,
        updates: Option<&BroadcastNamespace>,
    ) -> Result<(RpcServiceHandle, JoinHandle<()>), RpcError> {
        let (adapter, handle) = Self::new(engine, transport, updates)?;
        Ok((handle, tokio::spawn(adapter.run())))
    }

    /// Event loop. Returns after a shutdown command, when every handle is
    /// dropped, or when the reply subscription closes.
    pub async fn run(mut self) {
        info!(node = %self.engine.node_id(), "[RpcBusAdapter] Started");
        let mut shutdown_ack = None;

        loop {
            let sweep_in = self.engine.time_until_sweep();

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(RpcCommand::Shutdown { reply }) => {
                        shutdown_ack = Some(reply);
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!(node = %self.engine.node_id(), "All handles dropped");
                        break;
                    }
                },
                msg = self.replies.recv() => match msg {
                    Some(msg) => self.engine.on_reply(&msg.payload),
                    None => {
                        warn!(node = %self.engine.node_id(), "Reply subscription closed, shutting down");
                        break;
                    }
                },
                msg = recv_optional(&mut self.updates) => match msg {
                    Some(msg) => self.engine.on_broadcast_update(&msg.payload),
                    None => {
                        warn!(node = %self.engine.node_id(), "Update subscription closed");
                        self.updates = None;
                    }
                },
                _ = sleep_optional(sweep_in) => self.engine.sweep(),
            }
        }

        self.engine.close();
        self.transport.unsubscribe_all(&self.subscriber_id);
        info!(node = %self.engine.node_id(), "[RpcBusAdapter] Stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    fn handle_command(&mut self, cmd: RpcCommand) {
        match cmd {
            RpcCommand::Submit {
                method,
                args,
                reply,
            } => {
                let _ = reply.send(self.engine.submit(&method, args));
            }
            RpcCommand::Flush { reply } => {
                let _ = reply.send(self.engine.flush());
            }
            RpcCommand::PendingCount { reply } => {
                let _ = reply.send(self.engine.pending_count());
            }
            RpcCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

async fn recv_optional(sub: &mut Option<Subscription>) -> Option<TransportMessage> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_optional(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running engine task.
#[derive(Clone)]
pub struct RpcServiceHandle {
    node_id: String,
    commands: mpsc::Sender<RpcCommand>,
    stats: Arc<RpcStats>,
}

impl RpcServiceHandle {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RpcCommand,
    ) -> Result<T, RpcError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| RpcError::EngineStopped)?;
        rx.await.map_err(|_| RpcError::EngineStopped)
    }
}

#[async_trait]
impl RpcApi for RpcServiceHandle {
    async fn submit(&self, method: &str, args: Value) -> Result<CorrelationId, RpcError> {
        let method = method.to_string();
        self.request(|reply| RpcCommand::Submit {
            method,
            args,
            reply,
        })
        .await?
    }

    async fn flush(&self) -> Result<usize, RpcError> {
        self.request(|reply| RpcCommand::Flush { reply }).await
    }

    async fn pending_count(&self) -> Result<usize, RpcError> {
        self.request(|reply| RpcCommand::PendingCount { reply }).await
    }

    fn stats(&self) -> RpcStatsSnapshot {
        self.stats.snapshot()
    }

    async fn shutdown(&self) -> Result<(), RpcError> {
        self.request(|reply| RpcCommand::Shutdown { reply }).await
    }
}
