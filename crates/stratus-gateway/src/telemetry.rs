// crates/stratus-gateway/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Metric hooks for dispatched requests.
// Purpose: Provide request counters and latency buckets without an exporter.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A thin metrics interface so deployments can plug in an exporter. The
//! gateway records one request event and one latency observation per
//! request; [`NoopMetrics`] is the default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;

use crate::protocol::WireConvention;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for request histograms.
pub const GATEWAY_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
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

/// Request metric event payload.
#[derive(Debug, Clone)]
pub struct RequestMetricEvent {
    /// Wire convention when dispatch got that far.
    pub convention: Option<WireConvention>,
    /// Target service when known.
    pub service: Option<&'static str>,
    /// Target operation when known.
    pub operation: Option<&'static str>,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gateway requests and latencies.
pub trait GatewayMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: &RequestMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: &RequestMetricEvent, latency: Duration);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_request(&self, _event: &RequestMetricEvent) {}

    fn record_latency(&self, _event: &RequestMetricEvent, _latency: Duration) {}
}
