//! # MOS Telemetry
//!
//! Logging and metrics for the bridge runtime.
//!
//! - **Logs**: `tracing` with an `EnvFilter` and a pretty or JSON `fmt` layer
//! - **Metrics**: a Prometheus registry with bridge-level counters, encoded
//!   as text by [`gather_metrics`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mos_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MOS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `MOS_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `MOS_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `MOS_SERVICE_NAME` | `mos-bridge` | Service name |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_metrics, register_metrics, DEVICE_ONLINE, HEARTBEATS, PENDING_REQUESTS, RPC_OUTPUTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the application. Calling this
/// twice in one process fails with [`TelemetryError::LoggingInit`].
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    logging::init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
