// crates/framepress-core/src/envelope.rs
// ============================================================================
// Module: Framepress Response Envelope
// Description: Success/failure envelope returned for every pipeline job.
// Purpose: Give clients one response shape with timing and notes channels.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every pipeline request produces exactly one [`JobResult`]: a success
//! carrying output URLs or a failure carrying a closed-taxonomy error.
//! Clients branch on the `ok` field; the HTTP status is always 200.
//! Invariants:
//! - A success envelope carries a non-empty final URL.
//! - The notes channel is append-only and never changes `ok`.
//! - Timing steps are recorded only for stages that were entered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorBody;
use crate::error::StageName;
use crate::identifiers::JobId;

// ============================================================================
// SECTION: Note Codes
// ============================================================================

/// Note emitted when the template was served from the cache.
pub const NOTE_TEMPLATE_CACHED: &str = "TEMPLATE_CACHED";
/// Note emitted when the template was downloaded and published.
pub const NOTE_TEMPLATE_DOWNLOADED: &str = "TEMPLATE_DOWNLOADED";
/// Note emitted when the preview output shares bytes with the final output.
pub const NOTE_PREVIEW_EQUALS_FINAL: &str = "PREVIEW_EQUALS_FINAL";
/// Note emitted when an asset existence check caused the failure.
pub const NOTE_ASSET_NOT_FOUND: &str = "ASSET_NOT_FOUND";
/// Note emitted on failure naming the stage that failed.
pub const NOTE_STAGE_FAILED: &str = "STAGE_FAILED";

// ============================================================================
// SECTION: Timing
// ============================================================================

/// Wall-clock duration of a single entered stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
    /// Stage label.
    pub name: StageName,
    /// Stage duration in milliseconds.
    pub ms: u64,
}

/// Request timing: total duration plus per-stage steps.
///
/// # Invariants
/// - `steps` contains one entry per entered stage, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    /// Total request duration in milliseconds.
    pub total_ms: u64,
    /// Entered stages in execution order.
    pub steps: Vec<StepTiming>,
}

// ============================================================================
// SECTION: Notes
// ============================================================================

/// Structured informational observation appended during processing.
///
/// # Invariants
/// - Notes never change the envelope outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable note code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured detail.
    #[serde(default)]
    pub detail: Value,
}

impl Note {
    /// Builds a note from a code, message, and detail payload.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, detail: Value) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail,
        }
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Template identity echoed back in success envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRef {
    /// Template identifier code.
    pub template_code: String,
    /// Template version.
    pub version_semver: String,
    /// Manifest schema version.
    pub manifest_version: u64,
}

/// Output URLs minted by the storage boundary.
///
/// # Invariants
/// - `final_url` is non-empty on every success envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputUrls {
    /// Preview output URL.
    pub preview_url: String,
    /// Final output URL.
    pub final_url: String,
}

/// Successful job outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSuccess {
    /// Always `true`.
    pub ok: bool,
    /// Job identifier.
    pub job_id: JobId,
    /// Template identity.
    pub template: TemplateRef,
    /// Output URLs.
    pub outputs: OutputUrls,
    /// Request timing.
    pub timing: Timing,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
    /// Informational notes.
    pub notes: Vec<Note>,
}

/// Failed job outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    /// Always `false`.
    pub ok: bool,
    /// Job identifier.
    pub job_id: JobId,
    /// Closed-taxonomy error payload.
    pub error: ErrorBody,
    /// Timing accumulated before the failure.
    pub timing: Timing,
    /// Informational notes.
    pub notes: Vec<Note>,
}

/// Result envelope for one pipeline job.
///
/// # Invariants
/// - Serializes untagged; the `ok` field discriminates for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    /// Successful composition.
    Success(JobSuccess),
    /// Failed composition.
    Failure(JobFailure),
}

impl JobResult {
    /// Builds a success envelope.
    #[must_use]
    pub fn success(
        job_id: JobId,
        template: TemplateRef,
        outputs: OutputUrls,
        timing: Timing,
        warnings: Vec<String>,
        notes: Vec<Note>,
    ) -> Self {
        Self::Success(JobSuccess {
            ok: true,
            job_id,
            template,
            outputs,
            timing,
            warnings,
            notes,
        })
    }

    /// Builds a failure envelope.
    #[must_use]
    pub fn failure(job_id: JobId, error: ErrorBody, timing: Timing, notes: Vec<Note>) -> Self {
        Self::Failure(JobFailure {
            ok: false,
            job_id,
            error,
            timing,
            notes,
        })
    }

    /// Returns whether the job succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn job_id(&self) -> &JobId {
        match self {
            Self::Success(success) => &success.job_id,
            Self::Failure(failure) => &failure.job_id,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorCode;

    fn sample_timing() -> Timing {
        Timing {
            total_ms: 42,
            steps: vec![StepTiming {
                name: StageName::TemplateResolve,
                ms: 40,
            }],
        }
    }

    /// Tests success envelopes serialize with ok=true and camelCase keys.
    #[test]
    fn success_envelope_serializes_with_camel_case_keys() {
        let result = JobResult::success(
            JobId::new("job_1_deadbeef"),
            TemplateRef {
                template_code: "tpl_001".to_string(),
                version_semver: "0.1.0".to_string(),
                manifest_version: 1,
            },
            OutputUrls {
                preview_url: "http://localhost:9002/files/preview/job_1_deadbeef/preview.png"
                    .to_string(),
                final_url: "http://localhost:9002/files/final/job_1_deadbeef/final.png".to_string(),
            },
            sample_timing(),
            Vec::new(),
            vec![Note::new(NOTE_PREVIEW_EQUALS_FINAL, "preview equals final", Value::Null)],
        );
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["jobId"], json!("job_1_deadbeef"));
        assert_eq!(value["template"]["templateCode"], json!("tpl_001"));
        assert_eq!(value["outputs"]["finalUrl"].as_str().map(str::is_empty), Some(false));
        assert_eq!(value["timing"]["totalMs"], json!(42));
        assert_eq!(value["timing"]["steps"][0]["name"], json!("TEMPLATE_RESOLVE"));
        assert_eq!(value["notes"][0]["code"], json!("PREVIEW_EQUALS_FINAL"));
    }

    /// Tests failure envelopes carry the error body and accumulated timing.
    #[test]
    fn failure_envelope_serializes_error_body() {
        let result = JobResult::failure(
            JobId::new("job_2_0badcafe"),
            ErrorBody::new(
                ErrorCode::TemplateChecksumMismatch,
                "template checksum mismatch",
                json!({"expected": "aa", "actual": "bb"}),
            ),
            sample_timing(),
            Vec::new(),
        );
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["error"]["code"], json!("TEMPLATE_CHECKSUM_MISMATCH"));
        assert_eq!(value["error"]["retryable"], json!(false));
        assert_eq!(value["error"]["detail"]["expected"], json!("aa"));
    }

    /// Tests round-trip deserialization discriminates on ok.
    #[test]
    fn envelope_round_trip_discriminates_on_ok() {
        let failure = JobResult::failure(
            JobId::new("job_3_cafef00d"),
            ErrorBody::new(ErrorCode::RenderFailed, "render failed", Value::Null),
            Timing::default(),
            Vec::new(),
        );
        let text = serde_json::to_string(&failure).expect("serialize");
        let back: JobResult = serde_json::from_str(&text).expect("deserialize");
        assert!(!back.is_ok());
        assert_eq!(back.job_id().as_str(), "job_3_cafef00d");
    }
}
