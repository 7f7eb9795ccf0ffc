//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name reported at startup
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or full directive
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format
    pub json_logs: bool,

    /// Network identifier (testnet, mainnet, devnet)
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "raffle-randomness".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            network: "testnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `RAFFLE_SERVICE_NAME`: Service name (default: raffle-randomness)
    /// - `RAFFLE_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `RAFFLE_JSON_LOGS`: JSON logs (default: false in dev, true in containers)
    /// - `RAFFLE_NETWORK`: Network name (default: testnet)
    pub fn from_env() -> Self {
        let lookup = |key: &str| env::var(key).ok();
        Self::from_lookup(lookup)
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();
        let defaults = Self::default();

        Self {
            service_name: lookup("RAFFLE_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("RAFFLE_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: lookup("RAFFLE_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            network: lookup("RAFFLE_NETWORK").unwrap_or(defaults.network),
        }
    }
}
