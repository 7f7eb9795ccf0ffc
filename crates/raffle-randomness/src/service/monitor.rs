//! Fulfillment Monitor
//!
//! Background reconciliation. Four independent jobs share one shutdown
//! channel:
//!
//! | Job | Period | Effect |
//! |-----|--------|--------|
//! | poll | `polling_interval` | reconcile InProgress records, escalate stale ones, sweep Failed |
//! | balance | `balance_interval` | low-balance alert |
//! | health | `health_interval` | composite probe, alert on any failed check |
//! | daily | `daily_report_at` (UTC) | purge old failure metadata, prior-day report |

use super::coordinator::RandomnessCoordinator;
use super::{bounded, emit_event, SharedOracleConfig};
use crate::domain::{ChainId, MonitorConfig, RandomnessError, RandomnessResult, RequestStatus};
use crate::metrics;
use crate::ports::inbound::FulfillmentCheck;
use crate::ports::outbound::{Alert, AlertKind, RaffleRecordRepository, StatusCounts};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Reason recorded when the sweep resolves a record found in Failed.
pub const REASON_RECOVERED: &str = "recovered_failed";

/// Outcome of one polling pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    /// InProgress records examined.
    pub checked: usize,
    /// Fulfilled by the oracle this pass.
    pub fulfilled: usize,
    /// Still waiting.
    pub waiting: usize,
    /// Resolved by failsafe (retries exhausted or stale).
    pub failsafe: usize,
    /// Failed records recovered through failsafe.
    pub swept: usize,
    /// Records whose reconciliation errored.
    pub errors: usize,
}

/// Fee balance of the operating wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceStatus {
    /// Wallet checked.
    pub wallet: Option<String>,
    /// Chain queried.
    pub chain: ChainId,
    /// Balance in whole tokens, when the read succeeded.
    pub balance: Option<f64>,
    /// Alert threshold in whole tokens.
    pub threshold: f64,
    /// Balance below threshold.
    pub low: bool,
    /// Read failure, if any.
    pub error: Option<String>,
    /// Check time.
    pub checked_at: DateTime<Utc>,
}

/// Per-check health booleans.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthChecks {
    /// Settlement chain answers block queries.
    pub chain_connectivity: bool,
    /// Consumer contract is deployed and callable.
    pub contract_reachable: bool,
    /// Operating wallet configured.
    pub wallet_configured: bool,
    /// Fee balance at or above threshold.
    pub balance_sufficient: bool,
    /// Oracle subscription active.
    pub subscription_active: bool,
}

impl HealthChecks {
    /// Every check passed.
    pub fn all_passed(&self) -> bool {
        self.chain_connectivity
            && self.contract_reachable
            && self.wallet_configured
            && self.balance_sufficient
            && self.subscription_active
    }
}

/// Composite health probe result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Individual checks.
    pub checks: HealthChecks,
    /// All checks passed.
    pub healthy: bool,
    /// Human-readable failures.
    pub issues: Vec<String>,
    /// Settlement chain head at probe time.
    pub latest_block: Option<u64>,
    /// Probe time.
    pub checked_at: DateTime<Utc>,
}

/// Prior-day audit summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    /// Day covered (UTC).
    pub date: NaiveDate,
    /// Raffles resolved that day.
    pub resolved: usize,
    /// Of those, resolved by the oracle.
    pub oracle_fulfilled: usize,
    /// Of those, resolved by failsafe.
    pub failsafe_used: usize,
    /// `failsafe_used / resolved`, 0 when nothing resolved.
    pub failsafe_rate: f64,
    /// Current record counts by status.
    pub status_counts: StatusCounts,
    /// Records whose failure metadata was purged.
    pub purged_failures: usize,
    /// Generation time.
    pub generated_at: DateTime<Utc>,
}

struct MonitorJobs<R: RaffleRecordRepository> {
    coordinator: Arc<RandomnessCoordinator<R>>,
    oracle: SharedOracleConfig,
    config: MonitorConfig,
    last_balance: RwLock<Option<BalanceStatus>>,
    last_health: RwLock<Option<HealthReport>>,
    last_daily: RwLock<Option<DailyReport>>,
}

/// Background scheduler for reconciliation, balance, health and daily jobs.
pub struct FulfillmentMonitor<R: RaffleRecordRepository + 'static> {
    jobs: Arc<MonitorJobs<R>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: RaffleRecordRepository + 'static> FulfillmentMonitor<R> {
    /// Build a stopped monitor. Rejects configurations that would stall it.
    pub fn new(
        coordinator: Arc<RandomnessCoordinator<R>>,
        oracle: SharedOracleConfig,
        config: MonitorConfig,
    ) -> RandomnessResult<Self> {
        config.validate()?;
        Ok(Self {
            jobs: Arc::new(MonitorJobs {
                coordinator,
                oracle,
                config,
                last_balance: RwLock::new(None),
                last_health: RwLock::new(None),
                last_daily: RwLock::new(None),
            }),
            shutdown: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &MonitorConfig {
        &self.jobs.config
    }

    /// Spawn the job loops on the current tokio runtime. No-op if running.
    pub fn start(&self) {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            debug!("[randomness] monitor already running");
            return;
        }
        let (tx, rx) = watch::channel(false);
        let config = &self.jobs.config;

        let mut tasks = self.tasks.lock();
        tasks.push(spawn_periodic(
            "poll",
            config.polling_interval,
            rx.clone(),
            Arc::clone(&self.jobs),
            |jobs| async move {
                match jobs.poll_once().await {
                    Ok(summary) if summary == PollSummary::default() => {}
                    Ok(summary) => info!(
                        "[randomness] poll: {} checked, {} fulfilled, {} failsafe, {} swept, {} errors",
                        summary.checked, summary.fulfilled, summary.failsafe, summary.swept, summary.errors
                    ),
                    Err(e) => error!("[randomness] poll failed: {}", e),
                }
            },
        ));
        tasks.push(spawn_periodic(
            "balance",
            config.balance_interval,
            rx.clone(),
            Arc::clone(&self.jobs),
            |jobs| async move {
                jobs.check_balance_once().await;
            },
        ));
        tasks.push(spawn_periodic(
            "health",
            config.health_interval,
            rx.clone(),
            Arc::clone(&self.jobs),
            |jobs| async move {
                jobs.run_health_check().await;
            },
        ));
        tasks.push(spawn_daily(rx, Arc::clone(&self.jobs)));

        *shutdown = Some(tx);
        info!(
            "[randomness] monitor started (poll every {:?}, stale after {:?})",
            config.polling_interval, config.staleness_threshold
        );
    }

    /// Signal every job and wait for them to finish.
    pub async fn stop(&self) {
        let Some(tx) = self.shutdown.lock().take() else {
            return;
        };
        if let Err(e) = tx.send(true) {
            error!("[randomness] failed to send monitor shutdown: {}", e);
        }
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!("[randomness] monitor job ended abnormally: {}", e);
            }
        }
        info!("[randomness] monitor stopped");
    }

    /// Job loops are running.
    pub fn is_running(&self) -> bool {
        self.shutdown.lock().is_some()
    }

    /// One reconciliation pass.
    pub async fn poll_once(&self) -> RandomnessResult<PollSummary> {
        self.jobs.poll_once().await
    }

    /// One balance check.
    pub async fn check_balance_once(&self) -> BalanceStatus {
        self.jobs.check_balance_once().await
    }

    /// One composite health probe.
    pub async fn run_health_check(&self) -> HealthReport {
        self.jobs.run_health_check().await
    }

    /// Purge old failure metadata and produce the prior-day report.
    pub async fn run_daily_maintenance(&self) -> RandomnessResult<DailyReport> {
        self.jobs.run_daily_maintenance().await
    }

    /// Cached result of the last balance check.
    pub fn last_balance(&self) -> Option<BalanceStatus> {
        self.jobs.last_balance.read().clone()
    }

    /// Cached result of the last health probe.
    pub fn last_health(&self) -> Option<HealthReport> {
        self.jobs.last_health.read().clone()
    }

    /// Cached last daily report.
    pub fn last_daily_report(&self) -> Option<DailyReport> {
        self.jobs.last_daily.read().clone()
    }
}

fn spawn_periodic<R, F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    jobs: Arc<MonitorJobs<R>>,
    job: F,
) -> JoinHandle<()>
where
    R: RaffleRecordRepository + 'static,
    F: Fn(Arc<MonitorJobs<R>>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => job(Arc::clone(&jobs)).await,
                _ = shutdown.changed() => {
                    debug!("[randomness] {} job shutting down", name);
                    break;
                }
            }
        }
    })
}

fn spawn_daily<R: RaffleRecordRepository + 'static>(
    mut shutdown: watch::Receiver<bool>,
    jobs: Arc<MonitorJobs<R>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = jobs.coordinator.clock().now();
            let wait = until_next_daily(now, jobs.config.daily_report_at);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = jobs.run_daily_maintenance().await {
                        error!("[randomness] daily maintenance failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    debug!("[randomness] daily job shutting down");
                    break;
                }
            }
        }
    })
}

/// Time until the next `at` (UTC) strictly after `now`.
pub fn until_next_daily(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

impl<R: RaffleRecordRepository> MonitorJobs<R> {
    fn now(&self) -> DateTime<Utc> {
        self.coordinator.clock().now()
    }

    async fn poll_once(&self) -> RandomnessResult<PollSummary> {
        let repository = self.coordinator.repository();
        let staleness = ChronoDuration::from_std(self.config.staleness_threshold)
            .map_err(|e| RandomnessError::Validation(format!("staleness threshold: {e}")))?;

        let in_progress = repository.find_in_progress(self.config.batch_size).await?;
        metrics::set_requests_in_progress(in_progress.len());

        let mut summary = PollSummary {
            checked: in_progress.len(),
            ..Default::default()
        };

        for record in in_progress {
            let raffle_id = record.raffle_id;
            let check = self
                .coordinator
                .check_fulfillment_with_budget(&raffle_id, self.config.max_retries)
                .await;
            match check {
                Ok(FulfillmentCheck::Fulfilled(_)) => summary.fulfilled += 1,
                Ok(FulfillmentCheck::FailsafeResolved(_)) => summary.failsafe += 1,
                Ok(FulfillmentCheck::Skipped(_)) => {}
                Ok(FulfillmentCheck::Waiting { .. }) => {
                    match self.coordinator.resolve_if_stale(&raffle_id, staleness).await {
                        Ok(Some(_)) => summary.failsafe += 1,
                        Ok(None) => summary.waiting += 1,
                        Err(e) => {
                            summary.errors += 1;
                            warn!("[randomness] staleness escalation for {} failed: {}", raffle_id, e);
                        }
                    }
                }
                Err(e) => {
                    summary.errors += 1;
                    warn!("[randomness] reconciliation of {} failed: {}", raffle_id, e);
                }
            }
        }

        let failed = repository
            .find_by_status(RequestStatus::Failed, self.config.batch_size)
            .await?;
        for record in failed {
            match self
                .coordinator
                .resolve_with_failsafe_if(&record.raffle_id, REASON_RECOVERED, |r| {
                    r.status == RequestStatus::Failed
                })
                .await
            {
                Ok(_) => summary.swept += 1,
                // Moved by a concurrent writer between the query and the write.
                Err(RandomnessError::AlreadyResolved { .. } | RandomnessError::AlreadyRequested { .. }) => {}
                Err(e) => {
                    summary.errors += 1;
                    warn!(
                        "[randomness] failsafe sweep for {} failed: {}",
                        record.raffle_id, e
                    );
                }
            }
        }

        Ok(summary)
    }

    async fn check_balance_once(&self) -> BalanceStatus {
        let now = self.now();
        let registry = self.coordinator.registry();
        let chain = registry.settlement_chain();
        let wallet = self.oracle.read().operator_wallet.clone();
        let threshold = self.config.balance_threshold;

        let mut status = BalanceStatus {
            wallet: wallet.clone(),
            chain,
            balance: None,
            threshold,
            low: false,
            error: None,
            checked_at: now,
        };

        let Some(wallet) = wallet.filter(|w| !w.trim().is_empty()) else {
            status.error = Some("operator wallet not configured".into());
            *self.last_balance.write() = Some(status.clone());
            return status;
        };

        let read = match registry.settlement() {
            Ok(adapter) => {
                bounded(
                    self.coordinator.config().call_timeout,
                    adapter.get_balance(&wallet),
                )
                .await
            }
            Err(e) => {
                status.error = Some(e.to_string());
                *self.last_balance.write() = Some(status.clone());
                return status;
            }
        };

        match read {
            Ok(balance) => {
                let tokens = balance.as_tokens();
                status.balance = Some(tokens);
                status.low = tokens < threshold;
                metrics::set_fee_balance(tokens, status.low);
                if status.low {
                    let err = RandomnessError::InsufficientFunds {
                        balance: tokens,
                        threshold,
                    };
                    warn!(chain = %chain, "[randomness] {}", err);
                    self.coordinator.alerts().raise(
                        Alert::new(AlertKind::LowBalance, err.to_string(), now).on_chain(chain),
                    );
                }
            }
            Err(e) => {
                metrics::record_chain_call_failure(chain.as_str(), "get_balance");
                warn!(chain = %chain, "[randomness] balance check failed: {}", e);
                status.error = Some(e.to_string());
            }
        }

        *self.last_balance.write() = Some(status.clone());
        status
    }

    async fn run_health_check(&self) -> HealthReport {
        let now = self.now();
        let timeout = self.coordinator.config().call_timeout;
        let (wallet_configured, params) = {
            let oracle = self.oracle.read();
            (oracle.wallet_configured(), oracle.request_params())
        };

        let mut checks = HealthChecks {
            wallet_configured,
            ..Default::default()
        };
        let mut issues = Vec::new();
        let mut latest_block = None;

        if !wallet_configured {
            issues.push("operator wallet not configured".to_string());
        }

        match self.coordinator.registry().settlement() {
            Ok(adapter) => {
                let chain = adapter.chain();
                match bounded(timeout, adapter.latest_block()).await {
                    Ok(height) => {
                        checks.chain_connectivity = true;
                        latest_block = Some(height);
                    }
                    Err(e) => issues.push(format!("{chain} unreachable: {e}")),
                }
                match bounded(timeout, adapter.contract_reachable()).await {
                    Ok(true) => checks.contract_reachable = true,
                    Ok(false) => issues.push(format!("consumer contract not deployed on {chain}")),
                    Err(e) => issues.push(format!("consumer contract check failed: {e}")),
                }
                match bounded(timeout, adapter.subscription_active(&params)).await {
                    Ok(true) => checks.subscription_active = true,
                    Ok(false) => issues.push(format!(
                        "oracle subscription {} inactive",
                        params.subscription_id
                    )),
                    Err(e) => issues.push(format!("subscription check failed: {e}")),
                }
            }
            Err(e) => issues.push(e.to_string()),
        }

        let balance = self.check_balance_once().await;
        checks.balance_sufficient = balance.error.is_none() && !balance.low;
        if balance.low {
            issues.push(format!(
                "fee balance {:.4} below threshold {:.4}",
                balance.balance.unwrap_or_default(),
                balance.threshold
            ));
        } else if let Some(err) = balance.error.filter(|_| wallet_configured) {
            issues.push(format!("balance check failed: {err}"));
        }

        let healthy = checks.all_passed();
        if !healthy {
            warn!("[randomness] health check failed: {}", issues.join("; "));
            self.coordinator.alerts().raise(Alert::new(
                AlertKind::HealthCheckFailed,
                issues.join("; "),
                now,
            ));
        } else {
            debug!("[randomness] health check passed");
        }

        let report = HealthReport {
            checks,
            healthy,
            issues,
            latest_block,
            checked_at: now,
        };
        *self.last_health.write() = Some(report.clone());
        report
    }

    async fn run_daily_maintenance(&self) -> RandomnessResult<DailyReport> {
        let now = self.now();
        let repository = self.coordinator.repository();

        let retention = ChronoDuration::from_std(self.config.failure_retention)
            .map_err(|e| RandomnessError::Validation(format!("failure retention: {e}")))?;
        let purged_failures = repository.purge_failure_metadata(now - retention).await?;

        let date = now.date_naive() - ChronoDuration::days(1);
        let from = date.and_time(NaiveTime::MIN).and_utc();
        let to = from + ChronoDuration::days(1);
        let resolved = repository.find_resolved_between(from, to).await?;
        let failsafe_used = resolved.iter().filter(|r| r.failsafe_used).count();
        let failsafe_rate = if resolved.is_empty() {
            0.0
        } else {
            failsafe_used as f64 / resolved.len() as f64
        };

        let report = DailyReport {
            date,
            resolved: resolved.len(),
            oracle_fulfilled: resolved.len() - failsafe_used,
            failsafe_used,
            failsafe_rate,
            status_counts: repository.status_counts().await?,
            purged_failures,
            generated_at: now,
        };

        info!(
            "[randomness] daily report {}: {} resolved, {} failsafe ({:.1}%), {} purged",
            date,
            report.resolved,
            report.failsafe_used,
            report.failsafe_rate * 100.0,
            purged_failures
        );
        emit_event(
            "DailyReport",
            None,
            now,
            json!({
                "date": date.to_string(),
                "resolved": report.resolved,
                "failsafe_used": report.failsafe_used,
                "failsafe_rate": report.failsafe_rate,
                "purged_failures": purged_failures,
            }),
        );

        *self.last_daily.write() = Some(report.clone());
        Ok(report)
    }
}
