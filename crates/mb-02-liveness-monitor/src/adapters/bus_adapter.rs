//! Transport adapter for the liveness monitor
//!
//! One task per device: heartbeats from both channels, the watchdog
//! deadline and control commands are handled sequentially in one loop.

use async_trait::async_trait;
use serde_json::Value;
use shared_bus::{MessageTransport, QoS, Subscription};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{HeartbeatChannel, LivenessState, WatchdogConfig};
use crate::error::LivenessError;
use crate::metrics::{LivenessStats, LivenessStatsSnapshot};
use crate::ports::LivenessApi;
use crate::service::LivenessMonitor;

const COMMAND_CAPACITY: usize = 16;

#[derive(Debug)]
pub enum LivenessCommand {
    Query {
        reply: oneshot::Sender<LivenessState>,
    },
    Get {
        reply: oneshot::Sender<LivenessState>,
    },
    SetWatchdog {
        interval: Value,
        reply: oneshot::Sender<Result<WatchdogConfig, LivenessError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

pub struct LivenessBusAdapter {
    monitor: LivenessMonitor,
    transport: Arc<dyn MessageTransport>,
    commands: mpsc::Receiver<LivenessCommand>,
    sysinfo: Subscription,
    info: Subscription,
    subscriber_id: String,
}

impl LivenessBusAdapter {
    /// Subscribe both heartbeat channels and return the adapter plus its
    /// handle.
    pub fn new(
        monitor: LivenessMonitor,
        transport: Arc<dyn MessageTransport>,
        qos: QoS,
    ) -> Result<(Self, LivenessHandle), LivenessError> {
        let config = monitor.config().clone();
        let subscriber_id = monitor.node_id().to_string();

        let sysinfo = transport.subscribe(
            &HeartbeatChannel::SysInfo.topic(&config.namespace, &config.device_id),
            qos,
            &subscriber_id,
        )?;
        let info = transport.subscribe(
            &HeartbeatChannel::Info.topic(&config.namespace, &config.device_id),
            qos,
            &subscriber_id,
        )?;

        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = LivenessHandle {
            device_id: config.device_id.clone(),
            commands: tx,
            stats: monitor.stats(),
        };

        Ok((
            Self {
                monitor,
                transport,
                commands: rx,
                sysinfo,
                info,
                subscriber_id,
            },
            handle,
        ))
    }

    pub fn spawn(
        monitor: LivenessMonitor,
        transport: Arc<dyn MessageTransport>,
        qos: QoS,
    ) -> Result<(LivenessHandle, JoinHandle<()>), LivenessError> {
        let (adapter, handle) = Self::new(monitor, transport, qos)?;
        Ok((handle, tokio::spawn(adapter.run())))
    }

    pub async fn run(mut self) {
        self.monitor.start();
        info!(node = %self.monitor.node_id(), "[LivenessBusAdapter] Started");
        let mut shutdown_ack = None;

        loop {
            let deadline_in = self.monitor.time_until_deadline();

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(LivenessCommand::Shutdown { reply }) => {
                        shutdown_ack = Some(reply);
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!(node = %self.monitor.node_id(), "All handles dropped");
                        break;
                    }
                },
                msg = self.sysinfo.recv() => match msg {
                    Some(msg) => self.monitor.on_heartbeat(HeartbeatChannel::SysInfo, &msg.payload),
                    None => {
                        warn!(node = %self.monitor.node_id(), "SysInfo subscription closed, shutting down");
                        break;
                    }
                },
                msg = self.info.recv() => match msg {
                    Some(msg) => self.monitor.on_heartbeat(HeartbeatChannel::Info, &msg.payload),
                    None => {
                        warn!(node = %self.monitor.node_id(), "Info subscription closed, shutting down");
                        break;
                    }
                },
                _ = sleep_optional(deadline_in) => {
                    self.monitor.poll_deadline();
                }
            }
        }

        self.monitor.shutdown();
        self.transport.unsubscribe_all(&self.subscriber_id);
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    fn handle_command(&mut self, cmd: LivenessCommand) {
        match cmd {
            LivenessCommand::Query { reply } => {
                let _ = reply.send(self.monitor.query());
            }
            LivenessCommand::Get { reply } => {
                let _ = reply.send(self.monitor.report());
            }
            LivenessCommand::SetWatchdog { interval, reply } => {
                let _ = reply.send(self.monitor.reconfigure_raw(&interval));
            }
            LivenessCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

async fn sleep_optional(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running monitor task.
#[derive(Clone)]
pub struct LivenessHandle {
    device_id: String,
    commands: mpsc::Sender<LivenessCommand>,
    stats: Arc<LivenessStats>,
}

impl LivenessHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LivenessCommand,
    ) -> Result<T, LivenessError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| LivenessError::MonitorStopped)?;
        rx.await.map_err(|_| LivenessError::MonitorStopped)
    }
}

#[async_trait]
impl LivenessApi for LivenessHandle {
    async fn query(&self) -> Result<LivenessState, LivenessError> {
        self.request(|reply| LivenessCommand::Query { reply }).await
    }

    async fn get(&self) -> Result<LivenessState, LivenessError> {
        self.request(|reply| LivenessCommand::Get { reply }).await
    }

    async fn set_watchdog(&self, interval: Value) -> Result<WatchdogConfig, LivenessError> {
        self.request(|reply| LivenessCommand::SetWatchdog { interval, reply })
            .await?
    }

    fn stats(&self) -> LivenessStatsSnapshot {
        self.stats.snapshot()
    }

    async fn shutdown(&self) -> Result<(), LivenessError> {
        self.request(|reply| LivenessCommand::Shutdown { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LivenessConfig;
    use serde_json::json;
    use shared_bus::{InMemoryBroker, TokioClock};
    use shared_types::{OutputKind, RecordingSink};

    const SYSINFO: &str = "mos/main/v1/broadcast/dev/SysInfo";

    fn spawn_monitor(
        broker: &Arc<InMemoryBroker>,
        sink: &Arc<RecordingSink>,
        watchdog: u64,
    ) -> (LivenessHandle, JoinHandle<()>) {
        let monitor = LivenessMonitor::new(
            LivenessConfig::new("dev").with_watchdog(watchdog),
            sink.clone(),
            Arc::new(TokioClock::new()),
        )
        .unwrap();
        LivenessBusAdapter::spawn(monitor, broker.clone(), QoS::AtMostOnce).unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn heartbeat(broker: &InMemoryBroker) {
        broker
            .publish(SYSINFO, br#"{"uptime":5}"#.to_vec(), QoS::AtMostOnce, false)
            .unwrap();
    }

    fn online_events(sink: &RecordingSink) -> Vec<Option<bool>> {
        sink.of_kind(OutputKind::Online)
            .iter()
            .map(|o| o.payload["online"].as_bool())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_declares_offline() {
        let broker = Arc::new(InMemoryBroker::new());
        let sink = Arc::new(RecordingSink::new());
        let (handle, _task) = spawn_monitor(&broker, &sink, 2);
        settle().await;

        heartbeat(&broker);
        settle().await;
        assert_eq!(handle.query().await.unwrap(), LivenessState::Online);

        tokio::time::advance(Duration::from_millis(2_900)).await;
        settle().await;
        assert_eq!(handle.query().await.unwrap(), LivenessState::Online);

        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(handle.query().await.unwrap(), LivenessState::Offline);
        assert_eq!(online_events(&sink), vec![Some(true), Some(false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_watchdog_via_handle() {
        let broker = Arc::new(InMemoryBroker::new());
        let sink = Arc::new(RecordingSink::new());
        let (handle, _task) = spawn_monitor(&broker, &sink, 0);
        settle().await;

        assert!(handle.set_watchdog(json!("x")).await.is_err());
        assert_eq!(
            handle.set_watchdog(json!(1)).await.unwrap(),
            WatchdogConfig::new(1)
        );

        tokio::time::advance(Duration::from_millis(2_100)).await;
        settle().await;
        assert_eq!(handle.query().await.unwrap(), LivenessState::Offline);
        assert_eq!(handle.stats().rejected_reconfigurations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_reports_on_status_slot() {
        let broker = Arc::new(InMemoryBroker::new());
        let sink = Arc::new(RecordingSink::new());
        let (handle, task) = spawn_monitor(&broker, &sink, 0);
        settle().await;

        assert_eq!(handle.get().await.unwrap(), LivenessState::Unknown);
        assert_eq!(online_events(&sink), vec![None]);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(broker.registry().is_empty());
        assert_eq!(handle.query().await, Err(LivenessError::MonitorStopped));
    }
}
