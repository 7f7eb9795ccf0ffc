//! # Raffle Telemetry
//!
//! Log and metrics plumbing for the raffle randomness service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use raffle_telemetry::{init_tracing, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_tracing(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RAFFLE_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `RAFFLE_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `RAFFLE_SERVICE_NAME` | `raffle-randomness` | Service name on startup logs |
//! | `RAFFLE_NETWORK` | `testnet` | Network label |

#![warn(clippy::all)]

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::encode_metrics;
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Failed to encode Prometheus metrics: {0}")]
    MetricsEncode(String),
}
