//! # Raffle Randomness
//!
//! Randomness-request lifecycle for raffle draws.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every closed raffle ends with exactly one winning ticket number in
//! `[1, range]`, drawn fairly even when the external VRF oracle is down:
//! - Oracle draw requests, on-chain or settled cross-chain
//! - Fulfillment reconciliation by a background monitor
//! - Local failsafe draw when the oracle fails, stalls or is unreachable
//! - On-chain verification and audit of stored results
//!
//! ## Lifecycle
//!
//! | From | To | Trigger |
//! |------|----|---------|
//! | Pending | InProgress | draw submitted |
//! | InProgress | Fulfilled | oracle value observed |
//! | Pending, InProgress | Failed | submission error, retries exhausted, stale |
//! | Failed | Fulfilled | failsafe draw |
//! | InProgress | Pending | admin manual re-request |
//! | Fulfilled | Completed | winner recorded |
//!
//! ## Module Structure
//!
//! ```text
//! raffle-randomness/
//! ├── domain/      # Record, state machine, errors, config, invariants
//! ├── algorithms/  # Failsafe draw, seed expansion
//! ├── ports/       # RandomnessApi, ChainAdapter, repository, alerts, clock
//! ├── adapters/    # Simulated + JSON-RPC chains, registry, in-memory store
//! └── service/     # Coordinator, monitor, verifier, admin
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    ChainAdapterRegistry, FanoutAlertSink, InMemoryRaffleRepository, JsonRpcChainAdapter,
    JsonRpcEndpoint, ManualClock, RecordingAlertSink, SimulatedChainAdapter, SystemClock,
    TracingAlertSink,
};
pub use algorithms::{
    expand_seed, verify_expansion, ExpansionVerification, FailsafeRandomnessProvider,
};
pub use domain::{
    ChainError, ChainId, CoordinatorConfig, DrawOptions, MonitorConfig, OracleConfig,
    OracleConfigUpdate, RaffleId, RandomnessError, RandomnessRequestRecord, RandomnessResult,
    RepositoryError, RequestStatus,
};
pub use ports::{
    Alert, AlertKind, AlertSink, ChainAdapter, Clock, DrawOutcome, DrawPath, FailsafeOutcome,
    FulfillmentCheck, HistoryQuery, Page, RaffleRecordRepository, RandomnessApi,
};
pub use service::{
    AdminService, BalanceStatus, DailyReport, Dashboard, FulfillmentMonitor, HealthReport,
    OnChainVerifier, PollSummary, RandomnessCoordinator, RequestStats, SharedOracleConfig,
    Verdict, VerificationReport, VerificationResult,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
