//! Prometheus text exposition.
//!
//! Service metrics register themselves with the prometheus default registry
//! (`register_*!` macros), so exporting is a gather of that registry.

use prometheus::{Encoder, TextEncoder};

use crate::TelemetryError;

/// Encode the default registry as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsEncode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsEncode(e.to_string()))
}
