//! # Configuration
//!
//! Explicit configuration passed to the coordinator, monitor and admin
//! surface at construction.

use super::errors::{RandomnessError, RandomnessResult};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for the oracle callback gas limit.
pub const CALLBACK_GAS_LIMIT_RANGE: (u32, u32) = (20_000, 2_500_000);

/// Bounds for oracle request confirmations.
pub const REQUEST_CONFIRMATIONS_RANGE: (u16, u16) = (3, 200);

/// Fulfillment monitor configuration.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Reconciliation poll period.
    pub polling_interval: Duration,
    /// Max age of an InProgress request before forced failsafe.
    pub staleness_threshold: Duration,
    /// Failed status queries tolerated before forced failsafe.
    pub max_retries: u32,
    /// Low-balance alert threshold, in whole fee tokens.
    pub balance_threshold: f64,
    /// Records reconciled per poll.
    pub batch_size: usize,
    /// Balance check period.
    pub balance_interval: Duration,
    /// Health probe period.
    pub health_interval: Duration,
    /// Failure metadata older than this is purged by the daily job.
    pub failure_retention: Duration,
    /// UTC time of day for the daily maintenance job.
    pub daily_report_at: NaiveTime,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(30),
            staleness_threshold: Duration::from_secs(10 * 60),
            max_retries: 3,
            balance_threshold: 5.0,
            batch_size: 50,
            balance_interval: Duration::from_secs(5 * 60),
            health_interval: Duration::from_secs(60),
            failure_retention: Duration::from_secs(7 * 24 * 3600),
            daily_report_at: NaiveTime::MIN,
        }
    }
}

impl MonitorConfig {
    /// Reject configurations that would stall the monitor.
    pub fn validate(&self) -> RandomnessResult<()> {
        let intervals = [
            ("polling_interval", self.polling_interval),
            ("balance_interval", self.balance_interval),
            ("health_interval", self.health_interval),
        ];
        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(RandomnessError::Validation(format!("{name} must be non-zero")));
            }
        }
        if self.batch_size == 0 {
            return Err(RandomnessError::Validation("batch_size must be non-zero".into()));
        }
        if self.balance_threshold < 0.0 || !self.balance_threshold.is_finite() {
            return Err(RandomnessError::Validation(
                "balance_threshold must be a finite non-negative amount".into(),
            ));
        }
        Ok(())
    }
}

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Per-call budget for every chain call.
    pub call_timeout: Duration,
    /// Failed status queries tolerated on the on-demand path.
    pub max_retries: u32,
    /// Compare-and-set attempts before giving up on a contended record.
    pub max_cas_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(15),
            max_retries: 3,
            max_cas_attempts: 5,
        }
    }
}

/// Oracle (VRF) consumer configuration exposed to admin tooling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// VRF coordinator contract address.
    pub coordinator_address: String,
    /// Oracle subscription id funding the requests.
    pub subscription_id: u64,
    /// Gas lane key hash.
    pub key_hash: String,
    /// Gas limit for the fulfillment callback.
    pub callback_gas_limit: u32,
    /// Block confirmations before fulfillment.
    pub request_confirmations: u16,
    /// Operating wallet paying oracle fees.
    pub operator_wallet: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            coordinator_address: String::new(),
            subscription_id: 0,
            key_hash: String::new(),
            callback_gas_limit: 500_000,
            request_confirmations: 3,
            operator_wallet: None,
        }
    }
}

/// Oracle parameters carried by every draw submission and subscription check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequestParams {
    /// VRF coordinator contract address.
    pub coordinator_address: String,
    /// Subscription funding the request.
    pub subscription_id: u64,
    /// Gas lane key hash.
    pub key_hash: String,
    /// Gas limit for the fulfillment callback.
    pub callback_gas_limit: u32,
    /// Block confirmations before fulfillment.
    pub request_confirmations: u16,
}

/// Partial update for [`OracleConfig`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleConfigUpdate {
    /// New coordinator address.
    pub coordinator_address: Option<String>,
    /// New subscription id.
    pub subscription_id: Option<u64>,
    /// New key hash.
    pub key_hash: Option<String>,
    /// New callback gas limit.
    pub callback_gas_limit: Option<u32>,
    /// New confirmation count.
    pub request_confirmations: Option<u16>,
}

impl OracleConfig {
    /// Operating wallet is set and non-empty.
    pub fn wallet_configured(&self) -> bool {
        self.operator_wallet
            .as_deref()
            .map(|w| !w.trim().is_empty())
            .unwrap_or(false)
    }

    /// Parameters forwarded to the chain with each request.
    pub fn request_params(&self) -> OracleRequestParams {
        OracleRequestParams {
            coordinator_address: self.coordinator_address.clone(),
            subscription_id: self.subscription_id,
            key_hash: self.key_hash.clone(),
            callback_gas_limit: self.callback_gas_limit,
            request_confirmations: self.request_confirmations,
        }
    }

    /// Check bounds and required fields.
    pub fn validate(&self) -> RandomnessResult<()> {
        if self.coordinator_address.trim().is_empty() {
            return Err(RandomnessError::Validation(
                "coordinator address is required".into(),
            ));
        }
        if self.key_hash.trim().is_empty() {
            return Err(RandomnessError::Validation("key hash is required".into()));
        }
        let (min_gas, max_gas) = CALLBACK_GAS_LIMIT_RANGE;
        if !(min_gas..=max_gas).contains(&self.callback_gas_limit) {
            return Err(RandomnessError::Validation(format!(
                "callback gas limit {} outside {min_gas}..={max_gas}",
                self.callback_gas_limit
            )));
        }
        let (min_conf, max_conf) = REQUEST_CONFIRMATIONS_RANGE;
        if !(min_conf..=max_conf).contains(&self.request_confirmations) {
            return Err(RandomnessError::Validation(format!(
                "request confirmations {} outside {min_conf}..={max_conf}",
                self.request_confirmations
            )));
        }
        Ok(())
    }

    /// Apply an update, validating the result before returning it.
    pub fn apply(&self, update: OracleConfigUpdate) -> RandomnessResult<OracleConfig> {
        let mut next = self.clone();
        if let Some(address) = update.coordinator_address {
            next.coordinator_address = address;
        }
        if let Some(id) = update.subscription_id {
            next.subscription_id = id;
        }
        if let Some(key_hash) = update.key_hash {
            next.key_hash = key_hash;
        }
        if let Some(gas) = update.callback_gas_limit {
            next.callback_gas_limit = gas;
        }
        if let Some(confirmations) = update.request_confirmations {
            next.request_confirmations = confirmations;
        }
        next.validate()?;
        Ok(next)
    }
}
