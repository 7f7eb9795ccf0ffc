//! # Randomness Metrics
//!
//! Prometheus metrics for the draw lifecycle.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! raffle-randomness = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `randomness_draws_requested_total` - Oracle submissions (by chain, outcome)
//! - `randomness_fulfillments_total` - Oracle fulfillments applied (by chain)
//! - `randomness_failsafe_draws_total` - Failsafe resolutions (by reason)
//! - `randomness_chain_call_failures_total` - Failed chain calls (by chain, call)
//! - `randomness_verifications_total` - Verification verdicts (by verdict)
//! - `randomness_fee_balance_tokens` - Last observed oracle fee balance
//! - `randomness_fee_balance_low` - Low-balance flag (0=ok, 1=low)
//! - `randomness_requests_in_progress` - Records awaiting fulfillment

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_gauge, register_int_counter_vec, register_int_gauge, Gauge, IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Oracle submissions, labeled by chain and outcome
    pub static ref DRAWS_REQUESTED: IntCounterVec = register_int_counter_vec!(
        "randomness_draws_requested_total",
        "Total number of oracle draw submissions",
        &["chain", "outcome"]
    )
    .expect("Failed to create DRAWS_REQUESTED metric");

    /// Oracle fulfillments applied, labeled by chain
    pub static ref FULFILLMENTS: IntCounterVec = register_int_counter_vec!(
        "randomness_fulfillments_total",
        "Total number of oracle fulfillments applied",
        &["chain"]
    )
    .expect("Failed to create FULFILLMENTS metric");

    /// Failsafe resolutions, labeled by reason
    pub static ref FAILSAFE_DRAWS: IntCounterVec = register_int_counter_vec!(
        "randomness_failsafe_draws_total",
        "Total number of raffles resolved by the failsafe provider",
        &["reason"]
    )
    .expect("Failed to create FAILSAFE_DRAWS metric");

    /// Failed chain calls, labeled by chain and call
    pub static ref CHAIN_CALL_FAILURES: IntCounterVec = register_int_counter_vec!(
        "randomness_chain_call_failures_total",
        "Total number of failed chain adapter calls",
        &["chain", "call"]
    )
    .expect("Failed to create CHAIN_CALL_FAILURES metric");

    /// Verification verdicts
    pub static ref VERIFICATIONS: IntCounterVec = register_int_counter_vec!(
        "randomness_verifications_total",
        "Total number of on-chain verifications by verdict",
        &["verdict"]
    )
    .expect("Failed to create VERIFICATIONS metric");

    /// Last observed fee balance
    pub static ref FEE_BALANCE: Gauge = register_gauge!(
        "randomness_fee_balance_tokens",
        "Last observed oracle fee balance in whole tokens"
    )
    .expect("Failed to create FEE_BALANCE metric");

    /// Low-balance flag
    pub static ref FEE_BALANCE_LOW: IntGauge = register_int_gauge!(
        "randomness_fee_balance_low",
        "Whether the oracle fee balance is below threshold (0=no, 1=yes)"
    )
    .expect("Failed to create FEE_BALANCE_LOW metric");

    /// Records awaiting fulfillment at the last poll
    pub static ref REQUESTS_IN_PROGRESS: IntGauge = register_int_gauge!(
        "randomness_requests_in_progress",
        "Number of requests awaiting oracle fulfillment"
    )
    .expect("Failed to create REQUESTS_IN_PROGRESS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record an oracle submission
#[cfg(feature = "metrics")]
pub fn record_draw_requested(chain: &str, outcome: &str) {
    DRAWS_REQUESTED.with_label_values(&[chain, outcome]).inc();
}

/// Record an applied oracle fulfillment
#[cfg(feature = "metrics")]
pub fn record_fulfillment(chain: &str) {
    FULFILLMENTS.with_label_values(&[chain]).inc();
}

/// Record a failsafe resolution
#[cfg(feature = "metrics")]
pub fn record_failsafe(reason: &str) {
    FAILSAFE_DRAWS.with_label_values(&[reason]).inc();
}

/// Record a failed chain call
#[cfg(feature = "metrics")]
pub fn record_chain_call_failure(chain: &str, call: &str) {
    CHAIN_CALL_FAILURES.with_label_values(&[chain, call]).inc();
}

/// Record a verification verdict
#[cfg(feature = "metrics")]
pub fn record_verification(verdict: &str) {
    VERIFICATIONS.with_label_values(&[verdict]).inc();
}

/// Update fee balance gauges
#[cfg(feature = "metrics")]
pub fn set_fee_balance(tokens: f64, low: bool) {
    FEE_BALANCE.set(tokens);
    FEE_BALANCE_LOW.set(if low { 1 } else { 0 });
}

/// Update in-progress gauge
#[cfg(feature = "metrics")]
pub fn set_requests_in_progress(count: usize) {
    REQUESTS_IN_PROGRESS.set(count as i64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_draw_requested(_chain: &str, _outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_fulfillment(_chain: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_failsafe(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_chain_call_failure(_chain: &str, _call: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_verification(_verdict: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn set_fee_balance(_tokens: f64, _low: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn set_requests_in_progress(_count: usize) {}
