// crates/framepress-server/src/metrics.rs
// ============================================================================
// Module: Pipeline Metrics
// Description: Observability hooks for pipeline outcomes.
// Purpose: Provide metric events without hard exporter dependencies.
// Dependencies: framepress-core
// ============================================================================

//! ## Overview
//! A thin metrics seam for pipeline counters and latency. Deployments can
//! plug in their exporter of choice without touching the orchestrator; the
//! default implementation drops every event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use framepress_core::ErrorCode;
use framepress_core::StageName;

// ============================================================================
// SECTION: Metric Events
// ============================================================================

/// Pipeline outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Job succeeded.
    Ok,
    /// Job failed.
    Error,
}

impl PipelineOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// One processed job, as seen by metrics.
#[derive(Debug, Clone)]
pub struct PipelineMetricEvent {
    /// Job outcome.
    pub outcome: PipelineOutcome,
    /// Wire error code on failure.
    pub error_code: Option<ErrorCode>,
    /// Stage that failed, when known.
    pub failed_stage: Option<StageName>,
    /// Total job duration.
    pub duration: Duration,
}

// ============================================================================
// SECTION: Metrics Sink
// ============================================================================

/// Metrics sink for pipeline events.
pub trait PipelineMetrics: Send + Sync {
    /// Records one processed job.
    fn record(&self, event: &PipelineMetricEvent);
}

/// Metrics sink that drops every event.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl PipelineMetrics for NoopMetrics {
    fn record(&self, _event: &PipelineMetricEvent) {}
}
