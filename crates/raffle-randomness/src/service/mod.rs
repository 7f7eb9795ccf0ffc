//! # Services
//!
//! Lifecycle orchestration on top of the ports: coordinator, monitor,
//! verifier and the admin surface.

pub mod admin;
pub mod coordinator;
pub mod monitor;
pub mod verifier;

pub use admin::{AdminService, Dashboard, RequestStats};
pub use coordinator::RandomnessCoordinator;
pub use monitor::{BalanceStatus, DailyReport, FulfillmentMonitor, HealthChecks, HealthReport, PollSummary};
pub use verifier::{OnChainVerifier, Verdict, VerificationReport, VerificationResult};

use crate::domain::{ChainError, OracleConfig, RaffleId};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Oracle configuration shared between the admin surface and the monitor.
pub type SharedOracleConfig = Arc<RwLock<OracleConfig>>;

/// Run a chain call under `budget`. Expiry is reported as [`ChainError::Timeout`].
pub(crate) async fn bounded<T, F>(budget: Duration, call: F) -> Result<T, ChainError>
where
    F: Future<Output = Result<T, ChainError>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::Timeout(budget)),
    }
}

/// One-line JSON lifecycle event.
pub(crate) fn emit_event(
    event_type: &str,
    raffle_id: Option<&RaffleId>,
    at: DateTime<Utc>,
    metadata: serde_json::Value,
) {
    info!(
        "EVENT_FLOW_JSON {}",
        serde_json::json!({
            "timestamp": at.to_rfc3339_opts(SecondsFormat::Micros, true),
            "subsystem_id": "randomness",
            "event_type": event_type,
            "raffle_id": raffle_id.map(|id| id.as_str()),
            "metadata": metadata,
        })
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<(), ChainError> = bounded(Duration::from_secs(15), async {
            std::future::pending::<()>().await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(ChainError::Timeout(Duration::from_secs(15))));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, ChainError>(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
