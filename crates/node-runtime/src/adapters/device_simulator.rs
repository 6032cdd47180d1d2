//! # Device Simulator
//!
//! Loopback stand-in for a device, used when no real broker is available.
//!
//! - Answers every request on `<device>/rpc/#` on `<src>/rpc`.
//!   `<Service>.Read` returns the last value written, `<Service>.Write`
//!   stores its args, `Sys.GetInfo` returns the device info. Anything else
//!   is answered with an error.
//! - Publishes an Info heartbeat at start and a SysInfo heartbeat every
//!   period.
//! - Heartbeats and replies can each be paused to exercise the watchdog and
//!   the request timeout.

use serde_json::{json, Value};
use shared_bus::{MessageStream, MessageTransport, QoS, TransportError};
use shared_types::{topics, BroadcastNamespace, WireRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

const FIRMWARE: &str = "mos-sim 1.0";

/// Switches shared between the simulator task and its handle.
#[derive(Debug)]
struct Switches {
    heartbeats: AtomicBool,
    replies: AtomicBool,
}

pub struct DeviceSimulator {
    device_id: String,
    namespace: BroadcastNamespace,
    transport: Arc<dyn MessageTransport>,
    heartbeat_interval: Duration,
    requests: MessageStream,
    switches: Arc<Switches>,
    shutdown: watch::Receiver<bool>,
    values: HashMap<String, Value>,
    started: Instant,
}

impl DeviceSimulator {
    /// Subscribe the device's request topics and spawn the simulation task.
    pub fn spawn(
        device_id: &str,
        namespace: BroadcastNamespace,
        transport: Arc<dyn MessageTransport>,
        heartbeat_interval: Duration,
    ) -> Result<(SimulatorHandle, JoinHandle<()>), TransportError> {
        let filter = format!("{}/{}/#", device_id, topics::RPC_SEGMENT);
        let requests = transport
            .subscribe(&filter, QoS::AtMostOnce, &simulator_id(device_id))?
            .into_stream();

        let switches = Arc::new(Switches {
            heartbeats: AtomicBool::new(true),
            replies: AtomicBool::new(true),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let simulator = Self {
            device_id: device_id.to_string(),
            namespace: namespace.clone(),
            transport: transport.clone(),
            heartbeat_interval,
            requests,
            switches: switches.clone(),
            shutdown: shutdown_rx,
            values: HashMap::new(),
            started: Instant::now(),
        };
        let handle = SimulatorHandle {
            device_id: device_id.to_string(),
            namespace,
            transport,
            switches,
            shutdown: shutdown_tx,
        };
        Ok((handle, tokio::spawn(simulator.run())))
    }

    async fn run(mut self) {
        info!(device = %self.device_id, "[DeviceSimulator] Started");
        self.publish(&topics::info_topic(&self.namespace, &self.device_id), self.info());

        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.requests.next() => match msg {
                    Some(msg) => self.on_request(&msg.payload),
                    None => break,
                },
                _ = ticker.tick() => {
                    if self.switches.heartbeats.load(Ordering::SeqCst) {
                        let topic = topics::sysinfo_topic(&self.namespace, &self.device_id);
                        self.publish(&topic, self.sysinfo());
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.transport.unsubscribe_all(&simulator_id(&self.device_id));
        info!(device = %self.device_id, "[DeviceSimulator] Stopped");
    }

    fn on_request(&mut self, raw: &[u8]) {
        let request: WireRequest = match serde_json::from_slice(raw) {
            Ok(r) => r,
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "Ignoring malformed request");
                return;
            }
        };
        if !self.switches.replies.load(Ordering::SeqCst) {
            debug!(id = %request.id, method = %request.method, "Replies paused, dropping request");
            return;
        }

        let body = match self.execute(&request.method, request.args) {
            Ok(result) => json!({ "id": request.id, "result": result }),
            Err(error) => json!({ "id": request.id, "error": error }),
        };
        let topic = format!("{}/{}", request.src, topics::RPC_SEGMENT);
        self.publish(&topic, body);
    }

    fn execute(&mut self, method: &str, args: Value) -> Result<Value, Value> {
        match method.split_once('.') {
            Some(("Sys", "GetInfo")) => Ok(self.info()),
            Some((service, "Read")) => Ok(self
                .values
                .get(service)
                .cloned()
                .unwrap_or_else(|| json!({}))),
            Some((service, "Write")) => {
                self.values.insert(service.to_string(), args.clone());
                Ok(args)
            }
            _ => Err(json!({ "code": 404, "message": format!("No handler for {}", method) })),
        }
    }

    fn info(&self) -> Value {
        json!({ "id": self.device_id, "fw_version": FIRMWARE })
    }

    fn sysinfo(&self) -> Value {
        json!({ "id": self.device_id, "uptime": self.started.elapsed().as_secs() })
    }

    fn publish(&self, topic: &str, payload: Value) {
        if let Err(e) = self
            .transport
            .publish(topic, payload.to_string().into_bytes(), QoS::AtMostOnce, false)
        {
            warn!(device = %self.device_id, topic, error = %e, "Simulator publish failed");
        }
    }
}

fn simulator_id(device_id: &str) -> String {
    format!("{}/simulator", device_id)
}

/// Control handle of a running simulator.
pub struct SimulatorHandle {
    device_id: String,
    namespace: BroadcastNamespace,
    transport: Arc<dyn MessageTransport>,
    switches: Arc<Switches>,
    shutdown: watch::Sender<bool>,
}

impl SimulatorHandle {
    pub fn set_heartbeats(&self, enabled: bool) {
        info!(device = %self.device_id, enabled, "Simulated heartbeats");
        self.switches.heartbeats.store(enabled, Ordering::SeqCst);
    }

    pub fn set_replies(&self, enabled: bool) {
        info!(device = %self.device_id, enabled, "Simulated replies");
        self.switches.replies.store(enabled, Ordering::SeqCst);
    }

    /// Publish a `<service>.Update` broadcast as the device would.
    pub fn publish_update(&self, service: &str, payload: Value) -> Result<(), TransportError> {
        let topic = topics::update_topic(&self.namespace, &self.device_id, service);
        self.transport
            .publish(&topic, payload.to_string().into_bytes(), QoS::AtMostOnce, false)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
