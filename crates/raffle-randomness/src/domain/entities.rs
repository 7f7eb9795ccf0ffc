//! # Domain Entities
//!
//! The randomness request record embedded in each raffle aggregate, and the
//! transition methods that keep its invariants.

use super::errors::{RandomnessError, RandomnessResult};
use super::value_objects::{ChainId, RaffleId, RequestStatus, TxRef};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One record per raffle. Created Pending, never deleted, only transitioned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomnessRequestRecord {
    /// Owning raffle.
    pub raffle_id: RaffleId,
    /// Lifecycle state.
    pub status: RequestStatus,
    /// Submission hash of the oracle request. `None` whenever failsafe resolved.
    pub transaction_hash: Option<String>,
    /// Settlement-chain submission hash (cross-chain draws).
    pub settlement_tx_hash: Option<String>,
    /// Resolved ticket number, set once Fulfilled.
    pub winning_number: Option<u64>,
    /// Correlation id, fresh per request attempt.
    pub request_id: Option<String>,
    /// Winning number came from the failsafe provider.
    pub failsafe_used: bool,
    /// Chain that owns the raffle.
    pub source_chain: ChainId,
    /// Chain hosting the oracle request when it differs from the source.
    pub settlement_chain: Option<ChainId>,
    /// Oracle request id reported by the consumer contract.
    pub oracle_request_id: Option<String>,
    /// Draw range captured at request time.
    pub range: Option<u64>,
    /// Failed reconciliation attempts since the last Pending.
    pub retry_count: u32,
    /// Last observed failure classification.
    pub failure_reason: Option<String>,
    /// Record creation.
    pub created_at: DateTime<Utc>,
    /// Oracle submission time (drives staleness).
    pub requested_at: Option<DateTime<Utc>>,
    /// Resolution time.
    pub fulfilled_at: Option<DateTime<Utc>>,
    /// Last failure time (drives metadata retention).
    pub failed_at: Option<DateTime<Utc>>,
    /// Downstream consumption finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by the repository on every write.
    pub version: u64,
}

/// A successful oracle submission, ready to be recorded.
#[derive(Clone, Debug)]
pub struct Submission {
    /// Transaction reference from the adapter.
    pub tx: TxRef,
    /// Draw range.
    pub range: u64,
    /// Fresh correlation id.
    pub request_id: String,
    /// Submitted on the settlement chain on behalf of the source chain.
    pub cross_chain: bool,
}

/// Output of the failsafe provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailsafeDraw {
    /// Drawn ticket number in `[1, range]`.
    pub value: u64,
    /// Range drawn from.
    pub range: u64,
    /// Provenance tag recorded as the request id.
    pub provenance: String,
    /// Draw time.
    pub drawn_at: DateTime<Utc>,
}

impl RandomnessRequestRecord {
    /// Fresh Pending record.
    pub fn new(raffle_id: RaffleId, source_chain: ChainId, now: DateTime<Utc>) -> Self {
        Self {
            raffle_id,
            status: RequestStatus::Pending,
            transaction_hash: None,
            settlement_tx_hash: None,
            winning_number: None,
            request_id: None,
            failsafe_used: false,
            source_chain,
            settlement_chain: None,
            oracle_request_id: None,
            range: None,
            retry_count: 0,
            failure_reason: None,
            created_at: now,
            requested_at: None,
            fulfilled_at: None,
            failed_at: None,
            completed_at: None,
            version: 0,
        }
    }

    /// Winning number is known.
    pub fn is_resolved(&self) -> bool {
        self.status.is_resolved()
    }

    /// Chain holding the oracle request.
    pub fn queried_chain(&self) -> ChainId {
        self.settlement_chain.unwrap_or(self.source_chain)
    }

    /// Time since submission.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.requested_at.map(|at| now - at)
    }

    /// InProgress for longer than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status == RequestStatus::InProgress
            && self.age(now).map(|age| age > threshold).unwrap_or(false)
    }

    /// Transition to new state.
    pub fn transition_to(&mut self, next: RequestStatus) -> RandomnessResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(RandomnessError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Pending → InProgress with the submission details.
    pub fn mark_in_progress(
        &mut self,
        submission: Submission,
        now: DateTime<Utc>,
    ) -> RandomnessResult<()> {
        self.transition_to(RequestStatus::InProgress)?;
        if submission.cross_chain {
            self.settlement_chain = Some(submission.tx.chain);
            self.settlement_tx_hash = Some(submission.tx.tx_hash.clone());
        } else {
            self.settlement_chain = None;
            self.settlement_tx_hash = None;
        }
        self.transaction_hash = Some(submission.tx.tx_hash);
        self.oracle_request_id = submission.tx.oracle_request_id;
        self.request_id = Some(submission.request_id);
        self.range = Some(submission.range);
        self.retry_count = 0;
        self.failure_reason = None;
        self.requested_at = Some(now);
        Ok(())
    }

    /// InProgress → Fulfilled with the oracle value.
    pub fn mark_fulfilled(
        &mut self,
        value: u64,
        oracle_request_id: Option<String>,
        now: DateTime<Utc>,
    ) -> RandomnessResult<()> {
        self.transition_to(RequestStatus::Fulfilled)?;
        self.winning_number = Some(value);
        self.failsafe_used = false;
        if oracle_request_id.is_some() {
            self.oracle_request_id = oracle_request_id;
        }
        self.fulfilled_at = Some(now);
        Ok(())
    }

    /// Pending/InProgress → Failed. The range must already be known so the
    /// failsafe can always follow.
    pub fn mark_failed(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> RandomnessResult<()> {
        self.transition_to(RequestStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        self.failed_at = Some(now);
        Ok(())
    }

    /// Failed → Fulfilled from a failsafe draw. Clears the on-chain hash.
    pub fn resolve_with_failsafe(&mut self, draw: &FailsafeDraw) -> RandomnessResult<()> {
        self.transition_to(RequestStatus::Fulfilled)?;
        self.winning_number = Some(draw.value);
        self.failsafe_used = true;
        self.transaction_hash = None;
        self.request_id = Some(draw.provenance.clone());
        self.range = Some(draw.range);
        self.fulfilled_at = Some(draw.drawn_at);
        Ok(())
    }

    /// Count a failed status query. Only legal while InProgress.
    pub fn record_query_failure(&mut self, reason: impl Into<String>) -> RandomnessResult<u32> {
        if self.status != RequestStatus::InProgress {
            return Err(RandomnessError::InvalidTransition {
                from: self.status,
                to: RequestStatus::InProgress,
            });
        }
        self.retry_count += 1;
        self.failure_reason = Some(reason.into());
        Ok(self.retry_count)
    }

    /// InProgress → Pending for an administrative re-request.
    pub fn reset_to_pending(&mut self) -> RandomnessResult<()> {
        self.transition_to(RequestStatus::Pending)?;
        self.transaction_hash = None;
        self.settlement_tx_hash = None;
        self.settlement_chain = None;
        self.oracle_request_id = None;
        self.request_id = None;
        self.requested_at = None;
        self.retry_count = 0;
        self.failure_reason = None;
        Ok(())
    }

    /// Fulfilled → Completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> RandomnessResult<()> {
        self.transition_to(RequestStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn submission(cross_chain: bool) -> Submission {
        Submission {
            tx: TxRef {
                chain: ChainId::Polygon,
                tx_hash: "0xfeed".into(),
                oracle_request_id: Some("42".into()),
            },
            range: 10,
            request_id: "req-1".into(),
            cross_chain,
        }
    }

    fn in_progress(cross_chain: bool) -> RandomnessRequestRecord {
        let mut record = RandomnessRequestRecord::new("r-1".into(), ChainId::Solana, now());
        record.mark_in_progress(submission(cross_chain), now()).unwrap();
        record
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = RandomnessRequestRecord::new("r-1".into(), ChainId::Ethereum, now());
        assert_eq!(record.status, RequestStatus::Pending);
        assert!(record.winning_number.is_none());
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn test_mark_in_progress_same_chain() {
        let record = in_progress(false);
        assert_eq!(record.status, RequestStatus::InProgress);
        assert_eq!(record.transaction_hash.as_deref(), Some("0xfeed"));
        assert!(record.settlement_tx_hash.is_none());
        assert_eq!(record.queried_chain(), ChainId::Solana);
    }

    #[test]
    fn test_mark_in_progress_cross_chain_keeps_source() {
        let record = in_progress(true);
        assert_eq!(record.settlement_tx_hash.as_deref(), Some("0xfeed"));
        assert_eq!(record.source_chain, ChainId::Solana);
        assert_eq!(record.queried_chain(), ChainId::Polygon);
    }

    #[test]
    fn test_failsafe_clears_transaction_hash() {
        let mut record = in_progress(false);
        record.mark_failed("timeout", now()).unwrap();
        let draw = FailsafeDraw {
            value: 4,
            range: 10,
            provenance: "failsafe-abc".into(),
            drawn_at: now(),
        };
        record.resolve_with_failsafe(&draw).unwrap();
        assert!(record.failsafe_used);
        assert!(record.transaction_hash.is_none());
        assert_eq!(record.winning_number, Some(4));
        assert_eq!(record.request_id.as_deref(), Some("failsafe-abc"));
    }

    #[test]
    fn test_failsafe_requires_failed_state() {
        let mut record = in_progress(false);
        let draw = FailsafeDraw {
            value: 1,
            range: 10,
            provenance: "failsafe-x".into(),
            drawn_at: now(),
        };
        assert!(record.resolve_with_failsafe(&draw).is_err());
    }

    #[test]
    fn test_query_failures_only_while_in_progress() {
        let mut record = in_progress(false);
        assert_eq!(record.record_query_failure("rpc").unwrap(), 1);
        assert_eq!(record.record_query_failure("rpc").unwrap(), 2);

        let mut pending = RandomnessRequestRecord::new("r-2".into(), ChainId::Base, now());
        assert!(pending.record_query_failure("rpc").is_err());
    }

    #[test]
    fn test_reset_to_pending_clears_retry_count() {
        let mut record = in_progress(true);
        record.record_query_failure("rpc").unwrap();
        record.reset_to_pending().unwrap();
        assert_eq!(record.retry_count, 0);
        assert!(record.transaction_hash.is_none());
        assert!(record.settlement_chain.is_none());
    }

    #[test]
    fn test_is_stale() {
        let record = in_progress(false);
        let later = now() + Duration::minutes(11);
        assert!(record.is_stale(later, Duration::minutes(10)));
        assert!(!record.is_stale(now() + Duration::minutes(5), Duration::minutes(10)));
    }

    #[test]
    fn test_completed_only_from_fulfilled() {
        let mut record = in_progress(false);
        assert!(record.mark_completed(now()).is_err());
        record.mark_fulfilled(3, None, now()).unwrap();
        record.mark_completed(now()).unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        assert!(record.completed_at.is_some());
    }
}
