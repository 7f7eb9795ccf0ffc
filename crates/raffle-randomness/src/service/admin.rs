//! Admin surface: configuration, dashboard, history, verification and the
//! two operator escape hatches.
//!
//! Every return type is serde-serializable so an HTTP or CLI front end can
//! render it directly.

use super::coordinator::RandomnessCoordinator;
use super::monitor::{BalanceStatus, DailyReport, FulfillmentMonitor, HealthReport};
use super::verifier::{OnChainVerifier, VerificationReport, VerificationResult};
use super::SharedOracleConfig;
use crate::domain::{
    ChainId, OracleConfig, OracleConfigUpdate, RaffleId, RandomnessError,
    RandomnessRequestRecord, RandomnessResult, RequestStatus,
};
use crate::ports::inbound::{FailsafeOutcome, RandomnessApi};
use crate::ports::outbound::{HistoryQuery, Page, RaffleRecordRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Largest history page an operator may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Aggregate request statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub fulfilled: usize,
    pub completed: usize,
    pub failed: usize,
    /// Resolved records that used the failsafe.
    pub failsafe: usize,
    /// Share of resolved records fulfilled by the oracle. 0 when nothing is resolved.
    pub success_rate: f64,
}

/// Status dashboard.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dashboard {
    pub config: OracleConfig,
    pub balance: BalanceStatus,
    pub stats: RequestStats,
    pub recent: Vec<RandomnessRequestRecord>,
    pub last_health: Option<HealthReport>,
    pub last_daily: Option<DailyReport>,
    pub generated_at: DateTime<Utc>,
}

/// Operator-facing service.
pub struct AdminService<R: RaffleRecordRepository + 'static> {
    coordinator: Arc<RandomnessCoordinator<R>>,
    monitor: Arc<FulfillmentMonitor<R>>,
    verifier: OnChainVerifier<R>,
    oracle: SharedOracleConfig,
}

impl<R: RaffleRecordRepository + 'static> AdminService<R> {
    pub fn new(
        coordinator: Arc<RandomnessCoordinator<R>>,
        monitor: Arc<FulfillmentMonitor<R>>,
        oracle: SharedOracleConfig,
    ) -> Self {
        Self {
            verifier: OnChainVerifier::new(Arc::clone(&coordinator)),
            coordinator,
            monitor,
            oracle,
        }
    }

    /// Current oracle configuration.
    pub fn oracle_config(&self) -> OracleConfig {
        self.oracle.read().clone()
    }

    /// Validate and apply a configuration update. The stored config is
    /// untouched when validation fails.
    pub fn update_oracle_config(&self, update: OracleConfigUpdate) -> RandomnessResult<OracleConfig> {
        let mut guard = self.oracle.write();
        let next = guard.apply(update)?;
        *guard = next.clone();
        info!(
            subscription_id = next.subscription_id,
            callback_gas_limit = next.callback_gas_limit,
            request_confirmations = next.request_confirmations,
            "[randomness] oracle configuration updated"
        );
        Ok(next)
    }

    /// Configuration, live balance, statistics and the `recent` newest requests.
    pub async fn dashboard(&self, recent: usize) -> RandomnessResult<Dashboard> {
        let balance = self.monitor.check_balance_once().await;
        let stats = self.stats().await?;
        let recent = if recent == 0 {
            Vec::new()
        } else {
            self.coordinator
                .repository()
                .list(&HistoryQuery {
                    status: None,
                    page: 0,
                    page_size: recent.min(MAX_PAGE_SIZE),
                })
                .await?
                .items
        };

        Ok(Dashboard {
            config: self.oracle_config(),
            balance,
            stats,
            recent,
            last_health: self.monitor.last_health(),
            last_daily: self.monitor.last_daily_report(),
            generated_at: self.coordinator.clock().now(),
        })
    }

    /// Aggregate counts across all records.
    pub async fn stats(&self) -> RandomnessResult<RequestStats> {
        let repository = self.coordinator.repository();
        let counts = repository.status_counts().await?;
        let failsafe = repository.failsafe_count().await?;
        let count = |status: RequestStatus| counts.get(&status).copied().unwrap_or_default();

        let fulfilled = count(RequestStatus::Fulfilled);
        let completed = count(RequestStatus::Completed);
        let resolved = fulfilled + completed;
        let success_rate = if resolved == 0 {
            0.0
        } else {
            resolved.saturating_sub(failsafe) as f64 / resolved as f64
        };

        Ok(RequestStats {
            total: counts.values().sum(),
            pending: count(RequestStatus::Pending),
            in_progress: count(RequestStatus::InProgress),
            fulfilled,
            completed,
            failed: count(RequestStatus::Failed),
            failsafe,
            success_rate,
        })
    }

    /// Live balance check.
    pub async fn balance(&self) -> BalanceStatus {
        self.monitor.check_balance_once().await
    }

    /// Live health probe.
    pub async fn health(&self) -> HealthReport {
        self.monitor.run_health_check().await
    }

    /// Paginated request history, newest first.
    pub async fn history(
        &self,
        query: HistoryQuery,
    ) -> RandomnessResult<Page<RandomnessRequestRecord>> {
        if !(1..=MAX_PAGE_SIZE).contains(&query.page_size) {
            return Err(RandomnessError::Validation(format!(
                "page size {} outside 1..={MAX_PAGE_SIZE}",
                query.page_size
            )));
        }
        Ok(self.coordinator.repository().list(&query).await?)
    }

    pub async fn verify(&self, raffle_id: &RaffleId) -> RandomnessResult<VerificationResult> {
        self.verifier.verify(raffle_id).await
    }

    pub async fn verification_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RandomnessResult<VerificationReport> {
        self.verifier.report(from, to).await
    }

    /// Operator escape hatch. No-op on resolved raffles.
    pub async fn force_failsafe(
        &self,
        raffle_id: &RaffleId,
        reason: &str,
    ) -> RandomnessResult<FailsafeOutcome> {
        info!(raffle_id = %raffle_id, reason, "[randomness] admin forced failsafe");
        self.coordinator.force_failsafe(raffle_id, reason).await
    }

    /// Operator re-request of a stuck or never-submitted draw.
    pub async fn manual_request(
        &self,
        raffle_id: &RaffleId,
        source_chain: ChainId,
    ) -> RandomnessResult<RandomnessRequestRecord> {
        info!(raffle_id = %raffle_id, chain = %source_chain, "[randomness] admin manual request");
        self.coordinator.manual_request(raffle_id, source_chain).await
    }
}
