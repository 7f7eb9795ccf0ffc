//! Alert sinks.

use crate::ports::outbound::{Alert, AlertKind, AlertSink};
use parking_lot::Mutex;
use tracing::{error, warn};

/// Writes alerts to the tracing pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn raise(&self, alert: Alert) {
        let raffle_id = alert.raffle_id.as_ref().map(|id| id.as_str()).unwrap_or("-");
        let chain = alert.chain.map(|c| c.as_str()).unwrap_or("-");
        match alert.kind {
            AlertKind::VerificationMismatch | AlertKind::OracleValueOutOfRange => error!(
                alert = alert.kind.as_str(),
                raffle_id,
                chain,
                "[randomness] ALERT {}",
                alert.message
            ),
            _ => warn!(
                alert = alert.kind.as_str(),
                raffle_id,
                chain,
                "[randomness] ALERT {}",
                alert.message
            ),
        }
    }
}

/// Keeps every alert in memory. Used by tests and the admin dashboard.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts raised so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    /// Alerts of one kind.
    pub fn of_kind(&self, kind: AlertKind) -> Vec<Alert> {
        self.alerts
            .lock()
            .iter()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect()
    }

    /// Drop recorded alerts.
    pub fn clear(&self) {
        self.alerts.lock().clear();
    }
}

impl AlertSink for RecordingAlertSink {
    fn raise(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }
}

/// Fans one alert out to several sinks.
#[derive(Default)]
pub struct FanoutAlertSink {
    sinks: Vec<std::sync::Arc<dyn AlertSink>>,
}

impl FanoutAlertSink {
    /// Empty fanout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: std::sync::Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AlertSink for FanoutAlertSink {
    fn raise(&self, alert: Alert) {
        for sink in &self.sinks {
            sink.raise(alert.clone());
        }
    }
}
