//! Randomness Request Coordinator
//!
//! Drives one raffle's record through the lifecycle:
//!
//! ```text
//! request_draw ──ok──→ InProgress ──check_fulfillment──→ Fulfilled
//!      │                   │
//!      └──submit error──→ Failed ←──retries exhausted / stale──┘
//!                          │
//!                          └──failsafe──→ Fulfilled (failsafe_used)
//! ```
//!
//! Every write is a compare-and-set on the record version. The guard for a
//! transition is re-checked inside the CAS loop, so admin calls and the
//! monitor can race on the same record without a separate lock.

use super::{bounded, emit_event, SharedOracleConfig};
use crate::adapters::ChainAdapterRegistry;
use crate::algorithms::FailsafeRandomnessProvider;
use crate::domain::{
    invariant_request_requires_pending, invariant_winning_number_in_range, validate_range,
    validate_raffle_id, ChainError, ChainId, CoordinatorConfig, DrawOptions, OracleConfig,
    OracleStatus, RaffleId, RandomnessError, RandomnessRequestRecord, RandomnessResult,
    RequestStatus, Submission,
};
use crate::metrics;
use crate::ports::inbound::{DrawOutcome, DrawPath, FailsafeOutcome, FulfillmentCheck, RandomnessApi};
use crate::ports::outbound::{Alert, AlertKind, AlertSink, Clock, RaffleRecordRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Failure reason recorded when the retry budget runs out.
pub const REASON_QUERY_FAILED: &str = "query_failed";
/// Failure reason recorded for stale requests.
pub const REASON_TIMEOUT: &str = "timeout";

/// Orchestrates draw requests, reconciliation and failsafe resolution.
pub struct RandomnessCoordinator<R: RaffleRecordRepository> {
    config: CoordinatorConfig,
    repository: Arc<R>,
    registry: Arc<ChainAdapterRegistry>,
    failsafe: FailsafeRandomnessProvider,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    oracle: SharedOracleConfig,
    in_flight: Mutex<HashSet<RaffleId>>,
}

/// Marks a raffle as mid-submission until dropped.
struct InFlightSubmission<'a> {
    set: &'a Mutex<HashSet<RaffleId>>,
    raffle_id: RaffleId,
}

impl Drop for InFlightSubmission<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.raffle_id);
    }
}

impl<R: RaffleRecordRepository> RandomnessCoordinator<R> {
    /// Wire a coordinator.
    pub fn new(
        config: CoordinatorConfig,
        repository: Arc<R>,
        registry: Arc<ChainAdapterRegistry>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            repository,
            registry,
            failsafe: FailsafeRandomnessProvider::new(),
            alerts,
            clock,
            oracle: Arc::new(RwLock::new(OracleConfig::default())),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Submit draws under `oracle`, shared with the admin surface so
    /// updates apply to the next submission.
    pub fn with_oracle_config(mut self, oracle: SharedOracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    /// Oracle configuration read at every submission.
    pub fn oracle_config(&self) -> &SharedOracleConfig {
        &self.oracle
    }

    /// Configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Record store.
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Chain adapters.
    pub fn registry(&self) -> &Arc<ChainAdapterRegistry> {
        &self.registry
    }

    /// Alert sink.
    pub fn alerts(&self) -> &Arc<dyn AlertSink> {
        &self.alerts
    }

    /// Time source.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Failsafe provider.
    pub fn failsafe(&self) -> &FailsafeRandomnessProvider {
        &self.failsafe
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Claim the submission slot for `raffle_id` within this process.
    fn claim_submission(
        &self,
        record: &RandomnessRequestRecord,
    ) -> RandomnessResult<InFlightSubmission<'_>> {
        if !self.in_flight.lock().insert(record.raffle_id.clone()) {
            return Err(RandomnessError::AlreadyRequested {
                raffle_id: record.raffle_id.clone(),
                status: record.status,
            });
        }
        Ok(InFlightSubmission {
            set: &self.in_flight,
            raffle_id: record.raffle_id.clone(),
        })
    }

    /// Load a record or fail with [`RandomnessError::RaffleNotFound`].
    pub async fn load(&self, raffle_id: &RaffleId) -> RandomnessResult<RandomnessRequestRecord> {
        self.repository
            .get(raffle_id)
            .await?
            .ok_or_else(|| RandomnessError::RaffleNotFound(raffle_id.clone()))
    }

    /// Compare-and-set loop. `mutate` sees the freshest record each attempt
    /// and may reject it; a lost race reloads and retries.
    async fn update<F>(&self, raffle_id: &RaffleId, mut mutate: F) -> RandomnessResult<RandomnessRequestRecord>
    where
        F: FnMut(&mut RandomnessRequestRecord) -> RandomnessResult<()> + Send,
    {
        let attempts = self.config.max_cas_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self.load(raffle_id).await?;
            let mut next = current.clone();
            mutate(&mut next)?;
            next.version = current.version + 1;
            if self.repository.save_if_unchanged(current.version, &next).await? {
                return Ok(next);
            }
            debug!(
                "[randomness] lost write race on {} (attempt {}/{})",
                raffle_id, attempt, attempts
            );
        }
        Err(RandomnessError::ConcurrentModification {
            raffle_id: raffle_id.clone(),
            attempts,
        })
    }

    /// Resolve through failsafe. Pending and InProgress records are failed
    /// with `reason` first; Failed records keep their recorded reason.
    pub async fn resolve_with_failsafe(
        &self,
        raffle_id: &RaffleId,
        reason: &str,
    ) -> RandomnessResult<RandomnessRequestRecord> {
        self.resolve_with_failsafe_if(raffle_id, reason, |_| true).await
    }

    /// [`Self::resolve_with_failsafe`], but only while `still_owed` holds
    /// for the record being written. A record that no longer qualifies
    /// (e.g. re-requested in the meantime) is rejected with
    /// [`RandomnessError::AlreadyRequested`] and left untouched.
    pub(crate) async fn resolve_with_failsafe_if<G>(
        &self,
        raffle_id: &RaffleId,
        reason: &str,
        still_owed: G,
    ) -> RandomnessResult<RandomnessRequestRecord>
    where
        G: Fn(&RandomnessRequestRecord) -> bool + Send + Sync,
    {
        let now = self.now();
        let failsafe = self.failsafe;
        let record = self
            .update(raffle_id, |record| {
                if record.is_resolved() {
                    return Err(RandomnessError::AlreadyResolved {
                        raffle_id: record.raffle_id.clone(),
                        winning_number: record.winning_number.unwrap_or_default(),
                    });
                }
                if !still_owed(record) {
                    return Err(RandomnessError::AlreadyRequested {
                        raffle_id: record.raffle_id.clone(),
                        status: record.status,
                    });
                }
                let range = record.range.ok_or_else(|| {
                    RandomnessError::Validation(format!(
                        "no draw range recorded for raffle {}",
                        record.raffle_id
                    ))
                })?;
                if record.status != RequestStatus::Failed {
                    record.mark_failed(reason, now)?;
                }
                let draw = failsafe.draw_uniform(range, now)?;
                record.resolve_with_failsafe(&draw)
            })
            .await?;

        let failure = record.failure_reason.clone().unwrap_or_else(|| reason.to_string());
        metrics::record_failsafe(&failure);
        warn!(
            raffle_id = %raffle_id,
            reason = %failure,
            request_id = record.request_id.as_deref().unwrap_or_default(),
            "[randomness] raffle {} resolved by failsafe",
            raffle_id
        );
        emit_event(
            "FailsafeResolved",
            Some(raffle_id),
            now,
            json!({
                "reason": failure,
                "winning_number": record.winning_number,
                "range": record.range,
                "provenance": record.request_id,
            }),
        );
        self.alerts.raise(
            Alert::new(
                AlertKind::FailsafeTriggered,
                format!("raffle {raffle_id} resolved by failsafe ({failure})"),
                now,
            )
            .for_raffle(raffle_id)
            .on_chain(record.source_chain),
        );
        Ok(record)
    }

    /// Reconcile with an explicit retry budget.
    pub async fn check_fulfillment_with_budget(
        &self,
        raffle_id: &RaffleId,
        max_retries: u32,
    ) -> RandomnessResult<FulfillmentCheck> {
        let current = self.load(raffle_id).await?;
        if current.status != RequestStatus::InProgress {
            return Ok(FulfillmentCheck::Skipped(current.status));
        }

        let chain = current.queried_chain();
        let status = match self.registry.get(chain) {
            Ok(adapter) => {
                bounded(self.config.call_timeout, adapter.get_request_status(raffle_id)).await
            }
            Err(_) => Err(ChainError::UnsupportedChain(chain.to_string())),
        };

        let (oracle_request_id, value) = match status {
            Ok(status) if !status.fulfilled => {
                return Ok(FulfillmentCheck::Waiting {
                    record: current,
                    last_error: None,
                })
            }
            Ok(OracleStatus {
                oracle_request_id,
                value: Some(value),
                ..
            }) => (oracle_request_id, value),
            Ok(_) => {
                let err = ChainError::Decode("fulfilled request carries no value".into());
                return self.count_query_failure(raffle_id, chain, err, max_retries).await;
            }
            Err(e) => return self.count_query_failure(raffle_id, chain, e, max_retries).await,
        };

        self.apply_fulfillment(&current, chain, oracle_request_id, value)
            .await
    }

    async fn apply_fulfillment(
        &self,
        current: &RandomnessRequestRecord,
        chain: ChainId,
        oracle_request_id: String,
        value: u64,
    ) -> RandomnessResult<FulfillmentCheck> {
        let raffle_id = &current.raffle_id;
        let now = self.now();

        if let Some(range) = current.range {
            if !invariant_winning_number_in_range(value, range) {
                warn!(
                    raffle_id = %raffle_id,
                    chain = %chain,
                    "[randomness] oracle value {} outside [1, {}] for raffle {}",
                    value, range, raffle_id
                );
                self.alerts.raise(
                    Alert::new(
                        AlertKind::OracleValueOutOfRange,
                        format!("oracle delivered {value} for range {range}"),
                        now,
                    )
                    .for_raffle(raffle_id)
                    .on_chain(chain),
                );
            }
        }

        let updated = self
            .update(raffle_id, |record| {
                record.mark_fulfilled(value, Some(oracle_request_id.clone()), now)
            })
            .await;

        match updated {
            Ok(record) => {
                metrics::record_fulfillment(chain.as_str());
                info!(
                    raffle_id = %raffle_id,
                    chain = %chain,
                    "[randomness] raffle {} fulfilled by oracle with {}",
                    raffle_id, value
                );
                emit_event(
                    "DrawFulfilled",
                    Some(raffle_id),
                    now,
                    json!({
                        "chain": chain.as_str(),
                        "winning_number": value,
                        "oracle_request_id": record.oracle_request_id,
                        "transaction_hash": record.transaction_hash,
                    }),
                );
                Ok(FulfillmentCheck::Fulfilled(record))
            }
            // Another writer moved the record first.
            Err(RandomnessError::InvalidTransition { from, .. }) => Ok(FulfillmentCheck::Skipped(from)),
            Err(e) => Err(e),
        }
    }

    async fn count_query_failure(
        &self,
        raffle_id: &RaffleId,
        chain: ChainId,
        source: ChainError,
        max_retries: u32,
    ) -> RandomnessResult<FulfillmentCheck> {
        metrics::record_chain_call_failure(chain.as_str(), "get_request_status");
        let reason = source.to_string();

        let updated = self
            .update(raffle_id, |record| record.record_query_failure(reason.clone()).map(|_| ()))
            .await;
        let record = match updated {
            Ok(record) => record,
            Err(RandomnessError::InvalidTransition { from, .. }) => {
                return Ok(FulfillmentCheck::Skipped(from))
            }
            Err(e) => return Err(e),
        };

        let err = RandomnessError::Query {
            chain,
            attempt: record.retry_count,
            source,
        };
        warn!(raffle_id = %raffle_id, chain = %chain, "[randomness] {}", err);

        if record.retry_count < max_retries {
            return Ok(FulfillmentCheck::Waiting {
                record,
                last_error: Some(err.to_string()),
            });
        }

        let exhausted_request = record.request_id.clone();
        let exhausted = |r: &RandomnessRequestRecord| {
            r.status == RequestStatus::InProgress
                && r.request_id == exhausted_request
                && r.retry_count >= max_retries
        };
        match self
            .resolve_with_failsafe_if(raffle_id, REASON_QUERY_FAILED, exhausted)
            .await
        {
            Ok(record) => Ok(FulfillmentCheck::FailsafeResolved(record)),
            Err(RandomnessError::AlreadyResolved { .. } | RandomnessError::AlreadyRequested { .. }) => {
                Ok(FulfillmentCheck::Skipped(self.load(raffle_id).await?.status))
            }
            Err(e) => Err(e),
        }
    }

    /// Fail and resolve an InProgress record older than `threshold`.
    /// Returns `None` when the record is not stale.
    pub async fn resolve_if_stale(
        &self,
        raffle_id: &RaffleId,
        threshold: chrono::Duration,
    ) -> RandomnessResult<Option<RandomnessRequestRecord>> {
        let now = self.now();
        let record = self.load(raffle_id).await?;
        if !record.is_stale(now, threshold) {
            return Ok(None);
        }

        let elapsed_secs = record.age(now).map(|age| age.num_seconds()).unwrap_or_default();
        let err = RandomnessError::Timeout {
            raffle_id: raffle_id.clone(),
            elapsed_secs,
        };
        warn!(raffle_id = %raffle_id, "[randomness] {}", err);

        let stale = |r: &RandomnessRequestRecord| r.is_stale(now, threshold);
        match self.resolve_with_failsafe_if(raffle_id, REASON_TIMEOUT, stale).await {
            Ok(record) => Ok(Some(record)),
            Err(RandomnessError::AlreadyResolved { .. } | RandomnessError::AlreadyRequested { .. }) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn record_submission_failure(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: DrawOptions,
        reason: &str,
    ) -> RandomnessResult<RandomnessRequestRecord> {
        let now = self.now();
        self.update(raffle_id, |record| {
            invariant_request_requires_pending(record)?;
            record.range = Some(range);
            record.source_chain = options.source_chain;
            record.mark_failed(reason, now)
        })
        .await
    }
}

fn submission_failure_reason(err: &ChainError) -> &'static str {
    match err {
        ChainError::Timeout(_) => "submission_timeout",
        ChainError::AlreadyRequested(_) => "already_requested",
        ChainError::AlreadyFulfilled => "already_fulfilled",
        ChainError::UnsupportedChain(_) => "unsupported_chain",
        _ => "submission_failed",
    }
}

/// Failures `start_draw` absorbs into the failsafe path.
fn absorbed_by_failsafe(err: &RandomnessError) -> bool {
    matches!(
        err,
        RandomnessError::Submission { .. }
            | RandomnessError::UnsupportedChain(_)
            | RandomnessError::Query { .. }
            | RandomnessError::Timeout { .. }
    )
}

#[async_trait]
impl<R: RaffleRecordRepository> RandomnessApi for RandomnessCoordinator<R> {
    async fn register_raffle(
        &self,
        raffle_id: &RaffleId,
        source_chain: ChainId,
    ) -> RandomnessResult<RandomnessRequestRecord> {
        validate_raffle_id(raffle_id)?;
        let record = RandomnessRequestRecord::new(raffle_id.clone(), source_chain, self.now());
        self.repository.create(record.clone()).await?;
        debug!("[randomness] registered raffle {} on {}", raffle_id, source_chain);
        Ok(record)
    }

    async fn request_draw(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: DrawOptions,
    ) -> RandomnessResult<RandomnessRequestRecord> {
        validate_raffle_id(raffle_id)?;
        validate_range(range)?;

        let current = self.load(raffle_id).await?;
        invariant_request_requires_pending(&current)?;

        // One submission per raffle in this process. The reload catches a
        // submission that finished between the first check and the claim.
        let _claim = self.claim_submission(&current)?;
        let current = self.load(raffle_id).await?;
        invariant_request_requires_pending(&current)?;

        let target = if options.cross_chain {
            self.registry.settlement_chain()
        } else {
            options.source_chain
        };

        let adapter = match self.registry.get(target) {
            Ok(adapter) => adapter,
            Err(err) => {
                self.record_submission_failure(raffle_id, range, options, "unsupported_chain")
                    .await?;
                metrics::record_draw_requested(target.as_str(), "unsupported");
                return Err(err);
            }
        };

        let request_id = Uuid::new_v4().to_string();
        debug!(
            "[randomness] submitting draw for {} on {} (range {}, request {})",
            raffle_id, target, range, request_id
        );

        let oracle = self.oracle.read().request_params();
        let submitted = bounded(
            self.config.call_timeout,
            adapter.submit_draw(raffle_id, range, &options, &oracle),
        )
        .await;

        let tx = match submitted {
            Ok(tx) => tx,
            Err(source) => {
                metrics::record_draw_requested(target.as_str(), "failed");
                metrics::record_chain_call_failure(target.as_str(), "submit_draw");
                let reason = submission_failure_reason(&source);
                self.record_submission_failure(raffle_id, range, options, reason)
                    .await?;
                let err = RandomnessError::Submission {
                    chain: target,
                    source,
                };
                error!(raffle_id = %raffle_id, chain = %target, "[randomness] {}", err);
                return Err(err);
            }
        };

        let now = self.now();
        let submission = Submission {
            tx: tx.clone(),
            range,
            request_id: request_id.clone(),
            cross_chain: options.cross_chain,
        };
        let record = self
            .update(raffle_id, |record| {
                invariant_request_requires_pending(record)?;
                record.source_chain = options.source_chain;
                record.mark_in_progress(submission.clone(), now)
            })
            .await?;

        metrics::record_draw_requested(target.as_str(), "submitted");
        info!(
            raffle_id = %raffle_id,
            chain = %target,
            request_id = %request_id,
            "[randomness] draw requested for raffle {} ({})",
            raffle_id, tx.tx_hash
        );
        emit_event(
            "DrawRequested",
            Some(raffle_id),
            now,
            json!({
                "chain": target.as_str(),
                "source_chain": options.source_chain.as_str(),
                "cross_chain": options.cross_chain,
                "range": range,
                "request_id": request_id,
                "transaction_hash": tx.tx_hash,
                "oracle_request_id": tx.oracle_request_id,
            }),
        );
        Ok(record)
    }

    async fn start_draw(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: DrawOptions,
    ) -> RandomnessResult<DrawOutcome> {
        let err = match self.request_draw(raffle_id, range, options).await {
            Ok(record) => {
                return Ok(DrawOutcome {
                    path: DrawPath::Oracle,
                    record,
                })
            }
            Err(err) => err,
        };

        match err {
            RandomnessError::AlreadyRequested { .. } | RandomnessError::AlreadyResolved { .. } => {
                return Ok(DrawOutcome {
                    path: DrawPath::Existing,
                    record: self.load(raffle_id).await?,
                })
            }
            err if !absorbed_by_failsafe(&err) => return Err(err),
            err => warn!(raffle_id = %raffle_id, "[randomness] oracle path failed: {}", err),
        }

        match self.resolve_with_failsafe(raffle_id, "submission_failed").await {
            Ok(record) => Ok(DrawOutcome {
                path: DrawPath::Failsafe,
                record,
            }),
            Err(RandomnessError::AlreadyResolved { .. }) => Ok(DrawOutcome {
                path: DrawPath::Existing,
                record: self.load(raffle_id).await?,
            }),
            Err(e) => Err(e),
        }
    }

    async fn check_fulfillment(&self, raffle_id: &RaffleId) -> RandomnessResult<FulfillmentCheck> {
        self.check_fulfillment_with_budget(raffle_id, self.config.max_retries)
            .await
    }

    async fn force_failsafe(
        &self,
        raffle_id: &RaffleId,
        reason: &str,
    ) -> RandomnessResult<FailsafeOutcome> {
        validate_raffle_id(raffle_id)?;
        let current = self.load(raffle_id).await?;
        if current.is_resolved() {
            info!(
                "[randomness] force failsafe on resolved raffle {} ignored",
                raffle_id
            );
            return Ok(FailsafeOutcome {
                record: current,
                applied: false,
            });
        }

        match self.resolve_with_failsafe(raffle_id, reason).await {
            Ok(record) => Ok(FailsafeOutcome {
                record,
                applied: true,
            }),
            Err(RandomnessError::AlreadyResolved { .. }) => Ok(FailsafeOutcome {
                record: self.load(raffle_id).await?,
                applied: false,
            }),
            Err(e) => Err(e),
        }
    }

    async fn manual_request(
        &self,
        raffle_id: &RaffleId,
        source_chain: ChainId,
    ) -> RandomnessResult<RandomnessRequestRecord> {
        validate_raffle_id(raffle_id)?;
        let current = self.load(raffle_id).await?;

        match current.status {
            RequestStatus::Fulfilled | RequestStatus::Completed => {
                return Err(RandomnessError::AlreadyResolved {
                    raffle_id: raffle_id.clone(),
                    winning_number: current.winning_number.unwrap_or_default(),
                })
            }
            RequestStatus::Failed => {
                return Err(RandomnessError::AlreadyRequested {
                    raffle_id: raffle_id.clone(),
                    status: current.status,
                })
            }
            RequestStatus::Pending | RequestStatus::InProgress => {}
        }

        let range = current.range.ok_or_else(|| {
            RandomnessError::Validation(format!("no draw range recorded for raffle {raffle_id}"))
        })?;
        let cross_chain =
            current.settlement_chain.is_some() || !self.registry.contains(source_chain);

        if current.status == RequestStatus::InProgress {
            self.update(raffle_id, |record| {
                if record.status != RequestStatus::InProgress {
                    return Err(RandomnessError::AlreadyRequested {
                        raffle_id: record.raffle_id.clone(),
                        status: record.status,
                    });
                }
                record.reset_to_pending()
            })
            .await?;
            info!(
                "[randomness] raffle {} reset to pending for manual re-request",
                raffle_id
            );
        }

        self.request_draw(
            raffle_id,
            range,
            DrawOptions {
                cross_chain,
                source_chain,
            },
        )
        .await
    }

    async fn mark_completed(&self, raffle_id: &RaffleId) -> RandomnessResult<RandomnessRequestRecord> {
        let now = self.now();
        let record = self
            .update(raffle_id, |record| record.mark_completed(now))
            .await?;
        debug!("[randomness] raffle {} completed", raffle_id);
        Ok(record)
    }
}
