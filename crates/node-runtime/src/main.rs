//! # MOS Bridge
//!
//! Request/response RPC and device liveness over a publish/subscribe
//! transport.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logs + metrics)
//! 2. Load configuration (defaults + `MOS_*` environment overrides)
//! 3. Validate configuration
//! 4. Spawn one RPC engine per service, the liveness monitor and, in
//!    loopback mode, the simulated device
//! 5. Read console commands from stdin until `quit`, EOF or Ctrl+C
//! 6. Shut every task down; pending requests are discarded silently

use std::sync::Arc;

use anyhow::{Context, Result};
use mos_telemetry::TelemetryConfig;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use node_runtime::adapters::{OutputRouter, RoutedEvent};
use node_runtime::console;
use node_runtime::container::{BridgeConfig, BridgeContainer};
use shared_bus::{InMemoryBroker, TokioClock};

/// The running bridge.
struct BridgeRuntime {
    container: BridgeContainer,
    printer: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl BridgeRuntime {
    fn start(config: BridgeConfig) -> Result<Self> {
        info!("===========================================");
        info!("  MOS Bridge v{}", env!("CARGO_PKG_VERSION"));
        info!("  device: {}", config.identity.device_id);
        info!("  client: {}", config.identity.self_id);
        info!("===========================================");

        let broker = Arc::new(InMemoryBroker::new());
        if !config.simulator.enabled {
            warn!("Simulator disabled: nothing will answer on the in-memory broker");
        }

        let (router, events) = OutputRouter::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let printer = tokio::spawn(print_events(events, shutdown_rx));

        let container = BridgeContainer::start(
            &config,
            broker,
            Arc::new(router),
            Arc::new(TokioClock::new()),
        )
        .context("Failed to start bridge")?;

        info!(services = ?container.service_names(), "Type `help` for commands");
        Ok(Self {
            container,
            printer,
            shutdown_tx,
        })
    }

    async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        self.container.shutdown().await;

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        if let Err(e) = self.printer.await {
            warn!(error = %e, "Event printer ended abnormally");
        }
        info!("Shutdown complete");
    }
}

async fn print_events(
    mut events: mpsc::UnboundedReceiver<RoutedEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => println!("{}", console::format_event(&event)),
                None => break,
            },
            _ = shutdown.changed() => {
                // print whatever the shutdown itself produced
                while let Ok(event) = events.try_recv() {
                    println!("{}", console::format_event(&event));
                }
                break;
            }
        }
    }
}

/// Load configuration from the environment.
fn load_config() -> BridgeConfig {
    let config = BridgeConfig::from_env();
    info!(
        services = ?config.rpc.services,
        timeout_ms = config.rpc.timeout_ms,
        watchdog_secs = config.liveness.watchdog_secs,
        "Configuration loaded"
    );
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = mos_telemetry::init_telemetry(TelemetryConfig::from_env())?;

    let config = load_config();
    config.validate().context("Invalid configuration")?;

    let runtime = BridgeRuntime::start(config)?;

    let stdin = BufReader::new(tokio::io::stdin());
    let interrupted = tokio::select! {
        result = console::run(&runtime.container, stdin, tokio::io::stdout()) => {
            result.context("Console failed")?;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Interrupted");
            true
        }
    };

    runtime.shutdown().await;
    drop(telemetry);

    if interrupted {
        // the blocking stdin read would otherwise hold the runtime open
        std::process::exit(0);
    }
    Ok(())
}
