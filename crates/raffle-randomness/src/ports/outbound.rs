//! # Outbound Ports
//!
//! Traits for external dependencies (chains, storage, alerting, time).

use crate::domain::{
    ChainError, ChainId, DrawOptions, OracleRequestParams, OracleStatus, RaffleId,
    RandomnessRequestRecord, RepositoryError, RequestStatus, TokenBalance, TxMetadata, TxRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-chain gateway to the oracle consumer contract.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain served by this adapter.
    fn chain(&self) -> ChainId;

    /// Submit a draw request for `range` tickets under the given oracle parameters.
    async fn submit_draw(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: &DrawOptions,
        oracle: &OracleRequestParams,
    ) -> Result<TxRef, ChainError>;

    /// Read the oracle request tied to a raffle.
    async fn get_request_status(&self, raffle_id: &RaffleId) -> Result<OracleStatus, ChainError>;

    /// Fee-token balance of a wallet.
    async fn get_balance(&self, wallet: &str) -> Result<TokenBalance, ChainError>;

    /// Block anchoring of a transaction.
    async fn get_tx_metadata(&self, tx_hash: &str) -> Result<TxMetadata, ChainError>;

    /// Current chain head.
    async fn latest_block(&self) -> Result<u64, ChainError>;

    /// Consumer contract has code and answers calls.
    async fn contract_reachable(&self) -> Result<bool, ChainError>;

    /// Subscription `oracle.subscription_id` is active on `oracle.coordinator_address`.
    async fn subscription_active(&self, oracle: &OracleRequestParams) -> Result<bool, ChainError>;
}

/// Filter and page for the request history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Only records in this status.
    pub status: Option<RequestStatus>,
    /// Zero-based page.
    pub page: usize,
    /// Records per page.
    pub page_size: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: 0,
            page_size: 20,
        }
    }
}

/// One page of results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Zero-based page.
    pub page: usize,
    /// Requested page size.
    pub page_size: usize,
    /// Matching items across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    /// Number of pages for `total`.
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }
}

/// Record counts by status.
pub type StatusCounts = BTreeMap<RequestStatus, usize>;

/// Raffle record store. Writes are compare-and-set on `version`.
#[async_trait]
pub trait RaffleRecordRepository: Send + Sync {
    /// Insert a new record. Fails if one exists for the raffle.
    async fn create(&self, record: RandomnessRequestRecord) -> Result<(), RepositoryError>;

    /// Load a record.
    async fn get(&self, raffle_id: &RaffleId)
        -> Result<Option<RandomnessRequestRecord>, RepositoryError>;

    /// Store `record` only if the stored version still equals
    /// `expected_version`. Returns `false` when the race was lost.
    async fn save_if_unchanged(
        &self,
        expected_version: u64,
        record: &RandomnessRequestRecord,
    ) -> Result<bool, RepositoryError>;

    /// Up to `limit` InProgress records with a transaction hash, oldest request first.
    async fn find_in_progress(
        &self,
        limit: usize,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError>;

    /// Up to `limit` records in `status`.
    async fn find_by_status(
        &self,
        status: RequestStatus,
        limit: usize,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError>;

    /// Paginated history, newest first.
    async fn list(&self, query: &HistoryQuery)
        -> Result<Page<RandomnessRequestRecord>, RepositoryError>;

    /// Records resolved in `[from, to)`.
    async fn find_resolved_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError>;

    /// Clear failure metadata recorded before `before`. Returns records touched.
    async fn purge_failure_metadata(&self, before: DateTime<Utc>) -> Result<usize, RepositoryError>;

    /// Record counts by status.
    async fn status_counts(&self) -> Result<StatusCounts, RepositoryError>;

    /// Resolved records that used the failsafe.
    async fn failsafe_count(&self) -> Result<usize, RepositoryError>;
}

/// Operational alert classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Fee balance under threshold.
    LowBalance,
    /// A health check failed.
    HealthCheckFailed,
    /// A raffle was resolved by the failsafe.
    FailsafeTriggered,
    /// Stored winning number differs from the chain.
    VerificationMismatch,
    /// Oracle delivered a value outside `[1, range]`.
    OracleValueOutOfRange,
}

impl AlertKind {
    /// Snake-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowBalance => "low_balance",
            AlertKind::HealthCheckFailed => "health_check_failed",
            AlertKind::FailsafeTriggered => "failsafe_triggered",
            AlertKind::VerificationMismatch => "verification_mismatch",
            AlertKind::OracleValueOutOfRange => "oracle_value_out_of_range",
        }
    }
}

/// Operator alert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert class.
    pub kind: AlertKind,
    /// Raffle concerned, if any.
    pub raffle_id: Option<RaffleId>,
    /// Chain concerned, if any.
    pub chain: Option<ChainId>,
    /// Human-readable detail.
    pub message: String,
    /// Raise time.
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Alert not tied to a raffle.
    pub fn new(kind: AlertKind, message: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            raffle_id: None,
            chain: None,
            message: message.into(),
            raised_at,
        }
    }

    /// Attach a raffle.
    pub fn for_raffle(mut self, raffle_id: &RaffleId) -> Self {
        self.raffle_id = Some(raffle_id.clone());
        self
    }

    /// Attach a chain.
    pub fn on_chain(mut self, chain: ChainId) -> Self {
        self.chain = Some(chain);
        self
    }
}

/// Alert delivery. Must not block.
pub trait AlertSink: Send + Sync {
    /// Deliver an alert.
    fn raise(&self, alert: Alert);
}

/// Time source.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}
