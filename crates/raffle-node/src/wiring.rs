//! # Wiring
//!
//! Builds adapters, the coordinator, the monitor and the admin surface from
//! a [`NodeConfig`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use raffle_randomness::{
    AdminService, ChainAdapterRegistry, ChainId, FulfillmentMonitor, InMemoryRaffleRepository,
    JsonRpcChainAdapter, JsonRpcEndpoint, RandomnessCoordinator, SharedOracleConfig,
    SimulatedChainAdapter, SystemClock, TracingAlertSink,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NodeConfig;

/// Starting fee balance of the simulated operator wallet, in whole tokens.
pub const SIMULATED_WALLET_BALANCE: u64 = 100;

/// HTTP timeout for JSON-RPC requests.
pub const RPC_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Wiring failures.
#[derive(Debug, Error)]
pub enum WiringError {
    /// Chain adapter construction failed.
    #[error("chain adapter for {chain}: {reason}")]
    Adapter {
        /// Chain being wired
        chain: ChainId,
        /// Cause
        reason: String,
    },

    /// Service rejected its configuration.
    #[error(transparent)]
    Service(#[from] raffle_randomness::RandomnessError),
}

/// Fully wired randomness service.
///
/// Callers drive draws through `coordinator` and operator actions through
/// `admin`; the node itself only owns the monitor's background jobs.
pub struct RandomnessNode {
    /// Lifecycle coordinator.
    pub coordinator: Arc<RandomnessCoordinator<InMemoryRaffleRepository>>,
    /// Background monitor.
    pub monitor: Arc<FulfillmentMonitor<InMemoryRaffleRepository>>,
    /// Operator surface.
    pub admin: AdminService<InMemoryRaffleRepository>,
    /// Oracle config shared by the coordinator, admin and monitor.
    pub oracle: SharedOracleConfig,
}

impl RandomnessNode {
    /// Wire every component. Nothing is started.
    pub fn build(config: &NodeConfig) -> Result<Self, WiringError> {
        let registry = build_registry(config)?;
        info!(
            settlement = %registry.settlement_chain(),
            chains = ?registry.chains(),
            "[randomness] chain adapters registered"
        );

        let oracle: SharedOracleConfig = Arc::new(RwLock::new(config.oracle.clone()));
        if let Err(e) = config.oracle.validate() {
            warn!("[randomness] oracle configuration incomplete: {}", e);
        }

        let coordinator = Arc::new(
            RandomnessCoordinator::new(
                config.coordinator.clone(),
                Arc::new(InMemoryRaffleRepository::new()),
                Arc::new(registry),
                Arc::new(TracingAlertSink),
                Arc::new(SystemClock),
            )
            .with_oracle_config(Arc::clone(&oracle)),
        );
        let monitor = Arc::new(FulfillmentMonitor::new(
            Arc::clone(&coordinator),
            Arc::clone(&oracle),
            config.monitor.clone(),
        )?);
        let admin = AdminService::new(
            Arc::clone(&coordinator),
            Arc::clone(&monitor),
            Arc::clone(&oracle),
        );

        Ok(Self {
            coordinator,
            monitor,
            admin,
            oracle,
        })
    }

    /// Start background jobs.
    pub fn start(&self) {
        self.monitor.start();
    }

    /// Stop background jobs and wait for them.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.monitor.stop().await;
        info!("Shutdown complete");
    }
}

fn build_registry(config: &NodeConfig) -> Result<ChainAdapterRegistry, WiringError> {
    let settlement = config.settlement_chain;
    let mut registry = ChainAdapterRegistry::new(settlement);

    match &config.rpc {
        Some(rpc) => {
            let adapter = JsonRpcChainAdapter::new(JsonRpcEndpoint {
                chain: settlement,
                rpc_url: rpc.url.clone(),
                consumer_address: rpc.consumer_address.clone(),
                fee_token_address: rpc.fee_token_address.clone(),
                operator_address: config.oracle.operator_wallet.clone().unwrap_or_default(),
                http_timeout: RPC_HTTP_TIMEOUT,
            })
            .map_err(|e| WiringError::Adapter {
                chain: settlement,
                reason: e.to_string(),
            })?;
            info!(chain = %settlement, url = %rpc.url, "[randomness] using JSON-RPC chain adapter");
            registry.register(Arc::new(adapter));
        }
        None => {
            warn!("[randomness] RAFFLE_RPC_URL not set, running against simulated chains");
            for chain in ChainId::ALL {
                let adapter = SimulatedChainAdapter::new(chain);
                if let Some(wallet) = &config.oracle.operator_wallet {
                    adapter.set_balance(wallet, SIMULATED_WALLET_BALANCE);
                }
                registry.register(Arc::new(adapter));
            }
        }
    }

    Ok(registry)
}
