// crates/framepress-server/src/audit.rs
// ============================================================================
// Module: Job Audit Sinks
// Description: Structured per-job audit logging for the pipeline.
// Purpose: Record one stable JSON line per processed job.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every processed job emits one [`JobAuditEvent`] through the configured
//! [`JobAuditSink`]. The default sink writes a single JSON line to stderr;
//! a file sink and a no-op sink are provided for deployments and tests.
//! Invariants:
//! - Events never contain raw image bytes or internal filesystem paths.
//! - Sink failures are swallowed; auditing never fails a job.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;

use framepress_core::StepTiming;
use serde::Serialize;

// ============================================================================
// SECTION: Audit Event
// ============================================================================

/// One processed job, success or failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAuditEvent {
    /// Event label, always `pipeline_job`.
    pub event: &'static str,
    /// Job identifier.
    pub job_id: String,
    /// Requested template code.
    pub template_code: String,
    /// Requested template version.
    pub version_semver: String,
    /// Whether the job succeeded.
    pub ok: bool,
    /// Wire error code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    /// Total job duration in milliseconds.
    pub total_ms: u64,
    /// Entered stages in execution order.
    pub steps: Vec<StepTiming>,
}

impl JobAuditEvent {
    /// Builds an event shell for a job.
    #[must_use]
    pub fn new(job_id: String, template_code: String, version_semver: String) -> Self {
        Self {
            event: "pipeline_job",
            job_id,
            template_code,
            version_semver,
            ok: false,
            error_code: None,
            total_ms: 0,
            steps: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for job audit events.
pub trait JobAuditSink: Send + Sync {
    /// Records one event. Failures are swallowed by implementations.
    fn record(&self, event: &JobAuditEvent);
}

/// Sink writing one JSON line per event to stderr.
#[derive(Debug, Default)]
pub struct StderrJobAuditSink;

impl JobAuditSink for StderrJobAuditSink {
    fn record(&self, event: &JobAuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "{line}");
        }
    }
}

/// Sink appending one JSON line per event to a file.
pub struct FileJobAuditSink {
    /// Open audit log file.
    file: Mutex<File>,
}

impl FileJobAuditSink {
    /// Opens (or creates) the audit log for appending.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl JobAuditSink for FileJobAuditSink {
    fn record(&self, event: &JobAuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(file, "{line}");
        }
    }
}

/// Sink discarding every event.
#[derive(Debug, Default)]
pub struct NoopJobAuditSink;

impl JobAuditSink for NoopJobAuditSink {
    fn record(&self, _event: &JobAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use framepress_core::StageName;

    use super::*;

    /// Tests events serialize with camelCase keys and skip absent codes.
    #[test]
    fn event_serializes_with_camel_case_keys() {
        let mut event = JobAuditEvent::new(
            "job_1_deadbeef".to_string(),
            "tpl_001".to_string(),
            "0.1.0".to_string(),
        );
        event.ok = true;
        event.total_ms = 12;
        event.steps.push(StepTiming {
            name: StageName::TemplateResolve,
            ms: 8,
        });
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["event"], "pipeline_job");
        assert_eq!(value["jobId"], "job_1_deadbeef");
        assert_eq!(value["templateCode"], "tpl_001");
        assert!(value.get("errorCode").is_none());
        assert_eq!(value["steps"][0]["name"], "TEMPLATE_RESOLVE");
    }

    /// Tests the file sink appends one line per event.
    #[test]
    fn file_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.log");
        let sink = FileJobAuditSink::new(&path).expect("sink");
        let event = JobAuditEvent::new("job_a".to_string(), "tpl".to_string(), "1.0.0".to_string());
        sink.record(&event);
        sink.record(&event);
        let text = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(text.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(text.lines().next().expect("line"))
            .expect("json line");
        assert_eq!(first["jobId"], "job_a");
    }
}
