//! # Node Configuration
//!
//! Everything the node needs, read from `RAFFLE_*` environment variables
//! with defaults for local development.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `RAFFLE_SETTLEMENT_CHAIN` | `polygon` |
//! | `RAFFLE_RPC_URL` | unset (simulated chains) |
//! | `RAFFLE_CONSUMER_ADDRESS` | required with `RAFFLE_RPC_URL` |
//! | `RAFFLE_FEE_TOKEN_ADDRESS` | required with `RAFFLE_RPC_URL` |
//! | `RAFFLE_OPERATOR_WALLET` | unset |
//! | `RAFFLE_VRF_COORDINATOR` | empty |
//! | `RAFFLE_SUBSCRIPTION_ID` | `0` |
//! | `RAFFLE_KEY_HASH` | empty |
//! | `RAFFLE_CALLBACK_GAS_LIMIT` | `500000` |
//! | `RAFFLE_REQUEST_CONFIRMATIONS` | `3` |
//! | `RAFFLE_CALL_TIMEOUT_SECS` | `15` |
//! | `RAFFLE_POLL_INTERVAL_SECS` | `30` |
//! | `RAFFLE_STALENESS_SECS` | `600` |
//! | `RAFFLE_MAX_RETRIES` | `3` |
//! | `RAFFLE_BALANCE_THRESHOLD` | `5.0` |
//! | `RAFFLE_BATCH_SIZE` | `50` |

use raffle_randomness::{ChainId, CoordinatorConfig, MonitorConfig, OracleConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },

    /// A variable required by another is missing.
    #[error("{key} is required when {because} is set")]
    Missing {
        /// Missing variable
        key: &'static str,
        /// Variable that requires it
        because: &'static str,
    },
}

/// EVM JSON-RPC connection for the settlement chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// Node URL.
    pub url: String,
    /// VRF consumer contract.
    pub consumer_address: String,
    /// ERC-20 fee token.
    pub fee_token_address: String,
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Chain that settles cross-chain draws and pays oracle fees.
    pub settlement_chain: ChainId,
    /// JSON-RPC endpoint. `None` runs against simulated chains.
    pub rpc: Option<RpcConfig>,
    /// Oracle consumer settings.
    pub oracle: OracleConfig,
    /// Coordinator settings.
    pub coordinator: CoordinatorConfig,
    /// Monitor settings.
    pub monitor: MonitorConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            settlement_chain: ChainId::Polygon,
            rpc: None,
            oracle: OracleConfig::default(),
            coordinator: CoordinatorConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(chain) = parse(&get, "RAFFLE_SETTLEMENT_CHAIN")? {
            config.settlement_chain = chain;
        }

        if let Some(url) = get("RAFFLE_RPC_URL") {
            let require = |key: &'static str| {
                get(key).ok_or(ConfigError::Missing {
                    key,
                    because: "RAFFLE_RPC_URL",
                })
            };
            config.rpc = Some(RpcConfig {
                url,
                consumer_address: require("RAFFLE_CONSUMER_ADDRESS")?,
                fee_token_address: require("RAFFLE_FEE_TOKEN_ADDRESS")?,
            });
        }

        let oracle = &mut config.oracle;
        oracle.operator_wallet = get("RAFFLE_OPERATOR_WALLET");
        if let Some(address) = get("RAFFLE_VRF_COORDINATOR") {
            oracle.coordinator_address = address;
        }
        if let Some(key_hash) = get("RAFFLE_KEY_HASH") {
            oracle.key_hash = key_hash;
        }
        if let Some(id) = parse(&get, "RAFFLE_SUBSCRIPTION_ID")? {
            oracle.subscription_id = id;
        }
        if let Some(gas) = parse(&get, "RAFFLE_CALLBACK_GAS_LIMIT")? {
            oracle.callback_gas_limit = gas;
        }
        if let Some(confirmations) = parse(&get, "RAFFLE_REQUEST_CONFIRMATIONS")? {
            oracle.request_confirmations = confirmations;
        }

        if let Some(secs) = parse(&get, "RAFFLE_CALL_TIMEOUT_SECS")? {
            config.coordinator.call_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse(&get, "RAFFLE_MAX_RETRIES")? {
            config.coordinator.max_retries = retries;
            config.monitor.max_retries = retries;
        }

        let monitor = &mut config.monitor;
        if let Some(secs) = parse(&get, "RAFFLE_POLL_INTERVAL_SECS")? {
            monitor.polling_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&get, "RAFFLE_STALENESS_SECS")? {
            monitor.staleness_threshold = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse(&get, "RAFFLE_BALANCE_THRESHOLD")? {
            monitor.balance_threshold = threshold;
        }
        if let Some(batch) = parse(&get, "RAFFLE_BATCH_SIZE")? {
            monitor.batch_size = batch;
        }

        Ok(config)
    }

    /// Running without a JSON-RPC endpoint.
    pub fn is_simulated(&self) -> bool {
        self.rpc.is_none()
    }
}

fn parse<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
