//! On-chain verification of stored winning numbers.
//!
//! The chain is the source of truth. A mismatch is reported and alerted;
//! the stored record is never rewritten.

use super::coordinator::RandomnessCoordinator;
use super::{bounded, emit_event};
use crate::domain::{
    ChainId, RaffleId, RandomnessError, RandomnessRequestRecord, RandomnessResult,
};
use crate::metrics;
use crate::ports::outbound::{Alert, AlertKind, RaffleRecordRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Reason attached to failsafe-resolved raffles.
pub const FAILSAFE_NOT_VERIFIABLE: &str = "failsafe used - not independently verifiable";

/// Verification outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Stored value equals the chain's fulfilled value.
    Verified,
    /// Stored value differs from the chain.
    Mismatch,
    /// Resolved locally; nothing on chain to compare.
    FailsafeUsed,
    /// No winning number yet.
    NotResolved,
    /// Chain could not confirm either way.
    Unavailable,
}

impl Verdict {
    /// Metric and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Mismatch => "mismatch",
            Self::FailsafeUsed => "failsafe_used",
            Self::NotResolved => "not_resolved",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Per-raffle verification result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub raffle_id: RaffleId,
    pub verdict: Verdict,
    pub verified: bool,
    pub reason: Option<String>,
    pub stored_value: Option<u64>,
    pub on_chain_value: Option<u64>,
    /// Stored value lies in `1..=range`.
    pub in_range: bool,
    pub range: Option<u64>,
    pub failsafe_used: bool,
    /// Chain holding the oracle request.
    pub chain: ChainId,
    pub source_chain: ChainId,
    pub transaction_hash: Option<String>,
    pub oracle_request_id: Option<String>,
    pub block_number: Option<u64>,
    pub block_hash: Option<String>,
    pub block_timestamp: Option<DateTime<Utc>>,
    /// Block explorer link for the anchoring transaction.
    pub verification_url: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl VerificationResult {
    fn from_record(record: &RandomnessRequestRecord, verdict: Verdict, at: DateTime<Utc>) -> Self {
        let in_range = match (record.winning_number, record.range) {
            (Some(value), Some(range)) => (1..=range).contains(&value),
            _ => false,
        };
        Self {
            raffle_id: record.raffle_id.clone(),
            verdict,
            verified: verdict == Verdict::Verified,
            reason: None,
            stored_value: record.winning_number,
            on_chain_value: None,
            in_range,
            range: record.range,
            failsafe_used: record.failsafe_used,
            chain: record.queried_chain(),
            source_chain: record.source_chain,
            transaction_hash: record
                .settlement_tx_hash
                .clone()
                .or_else(|| record.transaction_hash.clone()),
            oracle_request_id: record.oracle_request_id.clone(),
            block_number: None,
            block_hash: None,
            block_timestamp: None,
            verification_url: None,
            checked_at: at,
        }
    }

    fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Aggregate over a resolution window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total: usize,
    pub verified: usize,
    pub mismatched: usize,
    pub failsafe: usize,
    pub unavailable: usize,
    /// `verified / total`, 0 for an empty window.
    pub verification_rate: f64,
    /// `failsafe / total`, 0 for an empty window.
    pub failsafe_rate: f64,
    pub results: Vec<VerificationResult>,
}

/// Compares stored results with the chain's fulfilled values.
pub struct OnChainVerifier<R: RaffleRecordRepository> {
    coordinator: Arc<RandomnessCoordinator<R>>,
}

impl<R: RaffleRecordRepository> OnChainVerifier<R> {
    pub fn new(coordinator: Arc<RandomnessCoordinator<R>>) -> Self {
        Self { coordinator }
    }

    /// Verify one raffle.
    pub async fn verify(&self, raffle_id: &RaffleId) -> RandomnessResult<VerificationResult> {
        let record = self.coordinator.load(raffle_id).await?;
        let now = self.coordinator.clock().now();

        let result = if !record.is_resolved() {
            VerificationResult::from_record(&record, Verdict::NotResolved, now)
                .with_reason("no winning number recorded")
        } else if record.failsafe_used {
            VerificationResult::from_record(&record, Verdict::FailsafeUsed, now)
                .with_reason(FAILSAFE_NOT_VERIFIABLE)
        } else {
            self.compare_with_chain(&record, now).await
        };

        metrics::record_verification(result.verdict.as_str());
        debug!(
            raffle_id = %raffle_id,
            verdict = result.verdict.as_str(),
            "[randomness] verification complete"
        );
        Ok(result)
    }

    /// Verify every raffle resolved in `[from, to)`.
    pub async fn report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RandomnessResult<VerificationReport> {
        if from >= to {
            return Err(RandomnessError::Validation(format!(
                "report window start {from} must precede end {to}"
            )));
        }

        let resolved = self
            .coordinator
            .repository()
            .find_resolved_between(from, to)
            .await?;

        let mut results = Vec::with_capacity(resolved.len());
        for record in &resolved {
            results.push(self.verify(&record.raffle_id).await?);
        }

        let count = |verdict: Verdict| results.iter().filter(|r| r.verdict == verdict).count();
        let total = results.len();
        let verified = count(Verdict::Verified);
        let failsafe = count(Verdict::FailsafeUsed);
        let rate = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };

        let report = VerificationReport {
            from,
            to,
            total,
            verified,
            mismatched: count(Verdict::Mismatch),
            failsafe,
            unavailable: count(Verdict::Unavailable),
            verification_rate: rate(verified),
            failsafe_rate: rate(failsafe),
            results,
        };

        info!(
            "[randomness] verification report: {}/{} verified, {} mismatched, {} failsafe",
            report.verified, report.total, report.mismatched, report.failsafe
        );
        Ok(report)
    }

    async fn compare_with_chain(
        &self,
        record: &RandomnessRequestRecord,
        now: DateTime<Utc>,
    ) -> VerificationResult {
        let mut result = VerificationResult::from_record(record, Verdict::Unavailable, now);
        let chain = result.chain;
        let timeout = self.coordinator.config().call_timeout;

        let adapter = match self.coordinator.registry().get(chain) {
            Ok(adapter) => adapter,
            Err(e) => return result.with_reason(e.to_string()),
        };

        if let Some(tx_hash) = result.transaction_hash.clone() {
            result.verification_url = Some(chain.tx_url(&tx_hash));
            match bounded(timeout, adapter.get_tx_metadata(&tx_hash)).await {
                Ok(meta) => {
                    result.block_number = Some(meta.block_number);
                    result.block_hash = meta.block_hash;
                    result.block_timestamp = Some(meta.timestamp);
                }
                Err(e) => {
                    metrics::record_chain_call_failure(chain.as_str(), "get_tx_metadata");
                    debug!(chain = %chain, "[randomness] tx metadata for {} unavailable: {}", tx_hash, e);
                }
            }
        }

        let status = match bounded(timeout, adapter.get_request_status(&record.raffle_id)).await {
            Ok(status) => status,
            Err(e) => {
                metrics::record_chain_call_failure(chain.as_str(), "get_request_status");
                return result.with_reason(format!("chain query failed: {e}"));
            }
        };

        let on_chain = match status.value {
            Some(value) if status.fulfilled => value,
            _ => return result.with_reason("oracle reports no fulfilled value"),
        };
        result.on_chain_value = Some(on_chain);
        let chain_request_id = status.oracle_request_id;
        if result.oracle_request_id.is_none() {
            result.oracle_request_id = Some(chain_request_id.clone());
        }

        let stored = record.winning_number.unwrap_or_default();
        let mismatch = if stored != on_chain {
            Some(RandomnessError::VerificationMismatch {
                raffle_id: record.raffle_id.clone(),
                stored,
                on_chain,
            })
        } else {
            // A matching value fulfilled under another request is not this draw.
            match record.oracle_request_id.as_deref() {
                Some(stored_request)
                    if !chain_request_id.is_empty() && stored_request != chain_request_id =>
                {
                    Some(RandomnessError::RequestMismatch {
                        raffle_id: record.raffle_id.clone(),
                        stored: stored_request.to_string(),
                        on_chain: chain_request_id.clone(),
                    })
                }
                _ => None,
            }
        };

        let Some(err) = mismatch else {
            result.verdict = Verdict::Verified;
            result.verified = true;
            if !result.in_range {
                result.reason = Some("stored value outside recorded range".into());
            }
            return result;
        };

        error!(raffle_id = %record.raffle_id, chain = %chain, "[randomness] {}", err);
        self.coordinator.alerts().raise(
            Alert::new(AlertKind::VerificationMismatch, err.to_string(), now)
                .for_raffle(&record.raffle_id)
                .on_chain(chain),
        );
        emit_event(
            "VerificationMismatch",
            Some(&record.raffle_id),
            now,
            json!({
                "stored": stored,
                "on_chain": on_chain,
                "stored_oracle_request_id": record.oracle_request_id,
                "on_chain_oracle_request_id": chain_request_id,
                "chain": chain.as_str(),
            }),
        );
        result.verdict = Verdict::Mismatch;
        result.with_reason(err.to_string())
    }
}
