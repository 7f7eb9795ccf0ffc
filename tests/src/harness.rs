//! Shared wiring for the scenario suite: simulated chains, in-memory
//! storage, a manual clock and a recording alert sink.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use raffle_randomness::{
    ChainAdapterRegistry, ChainId, CoordinatorConfig, DrawOptions, FulfillmentMonitor,
    InMemoryRaffleRepository, ManualClock, MonitorConfig, OnChainVerifier, OracleConfig,
    RaffleId, RandomnessApi, RandomnessCoordinator, RandomnessRequestRecord, RecordingAlertSink,
    SharedOracleConfig, SimulatedChainAdapter,
};

/// Operating wallet funded on every simulated chain.
pub const OPERATOR_WALLET: &str = "0x00000000000000000000000000000000000000f1";

/// Start of simulated time (2023-11-14T22:13:20Z).
pub const GENESIS_SECS: i64 = 1_700_000_000;

/// Settlement chain for cross-chain draws.
pub const SETTLEMENT: ChainId = ChainId::Polygon;

/// Coordinator, monitor and verifier over simulated EVM chains. Solana has
/// no adapter, so Solana raffles settle cross-chain.
pub struct Harness {
    pub coordinator: Arc<RandomnessCoordinator<InMemoryRaffleRepository>>,
    pub monitor: FulfillmentMonitor<InMemoryRaffleRepository>,
    pub verifier: OnChainVerifier<InMemoryRaffleRepository>,
    pub oracle: SharedOracleConfig,
    pub polygon: Arc<SimulatedChainAdapter>,
    pub ethereum: Arc<SimulatedChainAdapter>,
    pub base: Arc<SimulatedChainAdapter>,
    pub alerts: Arc<RecordingAlertSink>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default(), MonitorConfig::default())
    }

    pub fn with_config(coordinator_config: CoordinatorConfig, monitor_config: MonitorConfig) -> Self {
        let polygon = Arc::new(SimulatedChainAdapter::new(ChainId::Polygon));
        let ethereum = Arc::new(SimulatedChainAdapter::new(ChainId::Ethereum));
        let base = Arc::new(SimulatedChainAdapter::new(ChainId::Base));
        for chain in [&polygon, &ethereum, &base] {
            chain.set_balance(OPERATOR_WALLET, 50);
        }

        let registry = ChainAdapterRegistry::new(SETTLEMENT)
            .with(polygon.clone())
            .with(ethereum.clone())
            .with(base.clone());
        let alerts = Arc::new(RecordingAlertSink::new());
        let clock = Arc::new(ManualClock::new(genesis()));

        let oracle: SharedOracleConfig = Arc::new(RwLock::new(OracleConfig {
            coordinator_address: "0x00000000000000000000000000000000000000c0".into(),
            subscription_id: 1,
            key_hash: "0x00000000000000000000000000000000000000000000000000000000000000aa".into(),
            operator_wallet: Some(OPERATOR_WALLET.into()),
            ..Default::default()
        }));
        let coordinator = Arc::new(
            RandomnessCoordinator::new(
                coordinator_config,
                Arc::new(InMemoryRaffleRepository::new()),
                Arc::new(registry),
                alerts.clone(),
                clock.clone(),
            )
            .with_oracle_config(oracle.clone()),
        );
        let monitor = match FulfillmentMonitor::new(coordinator.clone(), oracle.clone(), monitor_config) {
            Ok(monitor) => monitor,
            Err(e) => panic!("harness monitor config rejected: {e}"),
        };

        Self {
            verifier: OnChainVerifier::new(coordinator.clone()),
            coordinator,
            monitor,
            oracle,
            polygon,
            ethereum,
            base,
            alerts,
            clock,
        }
    }

    /// Register a raffle on `chain`.
    pub async fn register(&self, raffle: &str, chain: ChainId) -> RaffleId {
        let id = RaffleId::new(raffle);
        if let Err(e) = self.coordinator.register_raffle(&id, chain).await {
            panic!("register {raffle}: {e}");
        }
        id
    }

    /// Register and submit a same-chain draw.
    pub async fn in_flight(&self, raffle: &str, chain: ChainId, range: u64) -> RaffleId {
        let id = self.register(raffle, chain).await;
        if let Err(e) = self
            .coordinator
            .request_draw(&id, range, DrawOptions::on_chain(chain))
            .await
        {
            panic!("request draw {raffle}: {e}");
        }
        id
    }

    pub async fn record(&self, id: &RaffleId) -> RandomnessRequestRecord {
        match self.coordinator.load(id).await {
            Ok(record) => record,
            Err(e) => panic!("load {id}: {e}"),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Harness start time.
pub fn genesis() -> DateTime<Utc> {
    DateTime::from_timestamp(GENESIS_SECS, 0).unwrap_or_default()
}
