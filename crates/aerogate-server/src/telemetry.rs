// crates/aerogate-server/src/telemetry.rs
// ============================================================================
// Module: Server Telemetry
// Description: Observability hooks for request counters and latency buckets.
// Purpose: Provide metric events without hard observability dependencies.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for request counters and
//! latency histograms. It is intentionally dependency-light so deployments
//! can plug in Prometheus or OpenTelemetry without redesign. Labels are
//! route names chosen by the server, never caller-controlled strings.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Latency buckets in milliseconds for request histograms.
pub const REQUEST_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Events
// ============================================================================

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

impl RequestOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// One request metric event.
#[derive(Debug, Clone)]
pub struct RequestMetric {
    /// Route label.
    pub route: &'static str,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// Request latency in milliseconds.
    pub latency_ms: u64,
}

/// Receives metric events.
pub trait MetricsRecorder: Send + Sync {
    /// Records one request metric.
    fn record(&self, metric: &RequestMetric);
}

/// Recorder that drops all metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl MetricsRecorder for NullRecorder {
    fn record(&self, _metric: &RequestMetric) {}
}

/// Returns the histogram bucket index for a latency value.
#[must_use]
pub fn bucket_index(latency_ms: u64) -> usize {
    REQUEST_LATENCY_BUCKETS_MS
        .iter()
        .position(|bound| latency_ms <= *bound)
        .unwrap_or(REQUEST_LATENCY_BUCKETS_MS.len())
}
