//! # Inbound Ports
//!
//! API trait defining what the randomness lifecycle can do for its
//! collaborators (raffle aggregate, admin tooling, monitor).

use crate::domain::{ChainId, DrawOptions, RaffleId, RandomnessRequestRecord, RandomnessResult, RequestStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Route a draw took.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawPath {
    /// Oracle request submitted and awaiting fulfillment.
    Oracle,
    /// Resolved locally by the failsafe provider.
    Failsafe,
    /// A request was already in flight or resolved; nothing new submitted.
    Existing,
}

/// Result of starting a draw.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrawOutcome {
    /// Route taken.
    pub path: DrawPath,
    /// Record after the draw started.
    pub record: RandomnessRequestRecord,
}

/// Result of one reconciliation of an InProgress record.
#[derive(Clone, Debug)]
pub enum FulfillmentCheck {
    /// Oracle value applied now.
    Fulfilled(RandomnessRequestRecord),
    /// Still waiting. `last_error` is set when the query itself failed.
    Waiting {
        /// Record after the check.
        record: RandomnessRequestRecord,
        /// Query failure counted against the retry budget, if any.
        last_error: Option<String>,
    },
    /// Retry budget exhausted; resolved by failsafe.
    FailsafeResolved(RandomnessRequestRecord),
    /// Record is not InProgress; nothing to reconcile.
    Skipped(RequestStatus),
}

impl FulfillmentCheck {
    /// Record carried by the outcome, if any.
    pub fn record(&self) -> Option<&RandomnessRequestRecord> {
        match self {
            FulfillmentCheck::Fulfilled(record)
            | FulfillmentCheck::FailsafeResolved(record)
            | FulfillmentCheck::Waiting { record, .. } => Some(record),
            FulfillmentCheck::Skipped(_) => None,
        }
    }
}

/// Result of a forced failsafe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailsafeOutcome {
    /// Record after the call.
    pub record: RandomnessRequestRecord,
    /// `false` when the raffle was already resolved and nothing changed.
    pub applied: bool,
}

impl FailsafeOutcome {
    /// Winning number, always present on success.
    pub fn winning_number(&self) -> Option<u64> {
        self.record.winning_number
    }
}

/// Randomness lifecycle API - inbound port.
#[async_trait]
pub trait RandomnessApi: Send + Sync {
    /// Create the Pending record for a new raffle.
    async fn register_raffle(
        &self,
        raffle_id: &RaffleId,
        source_chain: ChainId,
    ) -> RandomnessResult<RandomnessRequestRecord>;

    /// Submit an oracle draw. Requires Pending and `range > 0`.
    ///
    /// Concurrent calls for one raffle within a process submit at most once;
    /// the losers get [`RandomnessError::AlreadyRequested`]. Coordinators in
    /// separate processes sharing a store are only serialized by the final
    /// version-checked write, so both may reach the chain and the contract's
    /// own duplicate-request guard is the last line.
    ///
    /// [`RandomnessError::AlreadyRequested`]: crate::domain::RandomnessError::AlreadyRequested
    async fn request_draw(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: DrawOptions,
    ) -> RandomnessResult<RandomnessRequestRecord>;

    /// Entry window closed: request a draw, falling back to failsafe on any
    /// non-validation failure.
    async fn start_draw(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: DrawOptions,
    ) -> RandomnessResult<DrawOutcome>;

    /// Reconcile one record with the chain.
    async fn check_fulfillment(&self, raffle_id: &RaffleId) -> RandomnessResult<FulfillmentCheck>;

    /// Resolve through failsafe unless already resolved.
    async fn force_failsafe(&self, raffle_id: &RaffleId, reason: &str)
        -> RandomnessResult<FailsafeOutcome>;

    /// Administrative re-request.
    async fn manual_request(
        &self,
        raffle_id: &RaffleId,
        source_chain: ChainId,
    ) -> RandomnessResult<RandomnessRequestRecord>;

    /// Fulfilled → Completed.
    async fn mark_completed(&self, raffle_id: &RaffleId) -> RandomnessResult<RandomnessRequestRecord>;
}
