// crates/framepress-server/src/pipeline.rs
// ============================================================================
// Module: Pipeline Orchestrator
// Description: Sequences resolve, manifest, render, and store for one job.
// Purpose: Produce exactly one envelope per request, never a server fault.
// Dependencies: framepress-core, framepress-render, framepress-resolver, image
// ============================================================================

//! ## Overview
//! [`Pipeline::process`] threads a request through the four stages, timing
//! each entered stage, and maps every subsystem error onto the closed wire
//! taxonomy. This is the only place errors cross into wire codes; the
//! stage crates keep their own typed errors.
//! Invariants:
//! - A stage appears in `timing.steps` iff it was entered, in execution
//!   order, including the failing stage.
//! - Failures append a `STAGE_FAILED` note naming the stage.
//! - Request-shape violations fail before any stage is entered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use framepress_core::ErrorBody;
use framepress_core::ErrorCode;
use framepress_core::JobId;
use framepress_core::JobResult;
use framepress_core::Note;
use framepress_core::OutputKind;
use framepress_core::OutputStore;
use framepress_core::OutputUrls;
use framepress_core::RuntimeSpec;
use framepress_core::StageName;
use framepress_core::StepTiming;
use framepress_core::TemplateKey;
use framepress_core::TemplateRef;
use framepress_core::Timing;
use framepress_core::envelope::NOTE_ASSET_NOT_FOUND;
use framepress_core::envelope::NOTE_PREVIEW_EQUALS_FINAL;
use framepress_core::envelope::NOTE_STAGE_FAILED;
use framepress_core::envelope::NOTE_TEMPLATE_CACHED;
use framepress_core::envelope::NOTE_TEMPLATE_DOWNLOADED;
use framepress_core::manifest::ManifestError;
use framepress_core::manifest::load_manifest;
use framepress_core::manifest::to_runtime_spec;
use framepress_core::manifest::validate_assets;
use framepress_core::manifest::validate_manifest;
use framepress_render::RenderError;
use framepress_resolver::ResolveError;
use framepress_resolver::ResolveOutcome;
use framepress_resolver::ResolverConfig;
use framepress_resolver::TemplateResolver;
use image::ImageFormat;
use image::RgbaImage;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::JobAuditEvent;
use crate::audit::JobAuditSink;
use crate::config::FramepressConfig;
use crate::jobid::JobIdGenerator;
use crate::metrics::PipelineMetricEvent;
use crate::metrics::PipelineMetrics;
use crate::metrics::PipelineOutcome;

// ============================================================================
// SECTION: Request
// ============================================================================

/// One composition request, as decoded from the HTTP body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    /// Template identifier code.
    pub template_code: String,
    /// Template version.
    pub version_semver: String,
    /// Archive download URL.
    pub download_url: String,
    /// Expected archive SHA-256 (64 lowercase hex).
    pub checksum_sha256: String,
    /// Absolute local path of the raw photograph.
    pub raw_path: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while constructing a pipeline.
#[derive(Debug, Error)]
pub enum PipelineInitError {
    /// A subsystem failed to initialize.
    #[error("pipeline init failed: {0}")]
    Init(String),
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// The per-process pipeline orchestrator.
pub struct Pipeline {
    /// Template resolver (owns the single-flight cache).
    resolver: TemplateResolver,
    /// Output store boundary.
    store: Arc<dyn OutputStore>,
    /// Audit sink for processed jobs.
    audit: Arc<dyn JobAuditSink>,
    /// Metrics sink for processed jobs.
    metrics: Arc<dyn PipelineMetrics>,
    /// Job identifier generator.
    job_ids: JobIdGenerator,
}

impl Pipeline {
    /// Builds a pipeline from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineInitError`] when the resolver cannot be built.
    pub fn new(
        config: &FramepressConfig,
        store: Arc<dyn OutputStore>,
        audit: Arc<dyn JobAuditSink>,
        metrics: Arc<dyn PipelineMetrics>,
    ) -> Result<Self, PipelineInitError> {
        let mut resolver_config = ResolverConfig::new(config.effective_cache_root());
        resolver_config.connect_timeout = config.connect_timeout();
        resolver_config.read_timeout = config.read_timeout();
        let resolver = TemplateResolver::new(resolver_config)
            .map_err(|err| PipelineInitError::Init(err.to_string()))?;
        Ok(Self {
            resolver,
            store,
            audit,
            metrics,
            job_ids: JobIdGenerator,
        })
    }

    /// Mints a job identifier without running the pipeline.
    #[must_use]
    pub fn issue_job_id(&self) -> JobId {
        self.job_ids.issue()
    }

    /// Processes one request end to end.
    ///
    /// Always returns an envelope; nothing propagates past this boundary.
    #[must_use]
    pub fn process(&self, request: &ProcessRequest) -> JobResult {
        let job_id = self.job_ids.issue();
        self.process_with_job_id(job_id, request)
    }

    /// Processes one request under a pre-minted job identifier.
    #[must_use]
    pub fn process_with_job_id(&self, job_id: JobId, request: &ProcessRequest) -> JobResult {
        let started = Instant::now();
        let mut timing = Timing::default();
        let mut notes: Vec<Note> = Vec::new();

        // Request shape first: no stage is entered for malformed requests.
        let key = match validate_request(request) {
            Ok(key) => key,
            Err(body) => {
                return self.finish_failure(job_id, request, started, timing, notes, body, None);
            }
        };

        // Stage: TEMPLATE_RESOLVE.
        let stage_started = Instant::now();
        let resolved = self.resolver.resolve(&key, &request.download_url);
        push_step(&mut timing, StageName::TemplateResolve, stage_started);
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                let body = classify_resolve(&err);
                return self.finish_failure(
                    job_id,
                    request,
                    started,
                    timing,
                    notes,
                    body,
                    Some(StageName::TemplateResolve),
                );
            }
        };
        match resolved.outcome {
            ResolveOutcome::CacheHit => {
                notes.push(Note::new(NOTE_TEMPLATE_CACHED, "template served from cache", Value::Null));
            }
            ResolveOutcome::Downloaded => {
                notes.push(Note::new(
                    NOTE_TEMPLATE_DOWNLOADED,
                    "template downloaded and published",
                    Value::Null,
                ));
            }
        }

        // Stage: MANIFEST_LOAD.
        let stage_started = Instant::now();
        let spec = load_and_verify(&resolved.dir);
        push_step(&mut timing, StageName::ManifestLoad, stage_started);
        let spec = match spec {
            Ok(spec) => spec,
            Err(err) => {
                if let ManifestError::AssetNotFound { path, sticker_id } = &err {
                    notes.push(Note::new(
                        NOTE_ASSET_NOT_FOUND,
                        "referenced asset missing on disk",
                        json!({"path": path.display().to_string(), "stickerId": sticker_id}),
                    ));
                }
                let body = classify_manifest(&err);
                return self.finish_failure(
                    job_id,
                    request,
                    started,
                    timing,
                    notes,
                    body,
                    Some(StageName::ManifestLoad),
                );
            }
        };

        // Stage: RENDER.
        let stage_started = Instant::now();
        let rendered = render_stage(&spec, &request.raw_path);
        push_step(&mut timing, StageName::Render, stage_started);
        let png = match rendered {
            Ok(png) => png,
            Err(body) => {
                return self.finish_failure(
                    job_id,
                    request,
                    started,
                    timing,
                    notes,
                    body,
                    Some(StageName::Render),
                );
            }
        };

        // Stage: STORE. Preview currently shares bytes with the final.
        let stage_started = Instant::now();
        let stored = self.store_stage(&job_id, &png);
        push_step(&mut timing, StageName::Store, stage_started);
        match stored {
            Ok(outputs) => {
                notes.push(Note::new(
                    NOTE_PREVIEW_EQUALS_FINAL,
                    "preview output shares bytes with the final output",
                    Value::Null,
                ));
                let template = TemplateRef {
                    template_code: spec.template_code.clone(),
                    version_semver: spec.version_semver.clone(),
                    manifest_version: spec.manifest_version,
                };
                self.finish_success(job_id, request, started, timing, notes, template, outputs)
            }
            Err(body) => self.finish_failure(
                job_id,
                request,
                started,
                timing,
                notes,
                body,
                Some(StageName::Store),
            ),
        }
    }

    /// Persists preview and final outputs and collects their URLs.
    fn store_stage(&self, job_id: &JobId, png: &[u8]) -> Result<OutputUrls, ErrorBody> {
        let preview = self
            .store
            .store_output(job_id, OutputKind::Preview, png)
            .map_err(|err| classify_store(&err, OutputKind::Preview))?;
        let final_output = self
            .store
            .store_output(job_id, OutputKind::Final, png)
            .map_err(|err| classify_store(&err, OutputKind::Final))?;
        Ok(OutputUrls {
            preview_url: preview.url,
            final_url: final_output.url,
        })
    }

    /// Seals a success envelope and records observability events.
    fn finish_success(
        &self,
        job_id: JobId,
        request: &ProcessRequest,
        started: Instant,
        mut timing: Timing,
        notes: Vec<Note>,
        template: TemplateRef,
        outputs: OutputUrls,
    ) -> JobResult {
        timing.total_ms = elapsed_ms(started);
        let mut event = JobAuditEvent::new(
            job_id.to_string(),
            request.template_code.clone(),
            request.version_semver.clone(),
        );
        event.ok = true;
        event.total_ms = timing.total_ms;
        event.steps = timing.steps.clone();
        self.audit.record(&event);
        self.metrics.record(&PipelineMetricEvent {
            outcome: PipelineOutcome::Ok,
            error_code: None,
            failed_stage: None,
            duration: started.elapsed(),
        });
        JobResult::success(job_id, template, outputs, timing, Vec::new(), notes)
    }

    /// Seals a failure envelope and records observability events.
    fn finish_failure(
        &self,
        job_id: JobId,
        request: &ProcessRequest,
        started: Instant,
        mut timing: Timing,
        mut notes: Vec<Note>,
        body: ErrorBody,
        stage: Option<StageName>,
    ) -> JobResult {
        timing.total_ms = elapsed_ms(started);
        if let Some(stage) = stage {
            notes.push(Note::new(
                NOTE_STAGE_FAILED,
                format!("stage {} failed", stage.as_str()),
                json!({"stage": stage.as_str()}),
            ));
        }
        let mut event = JobAuditEvent::new(
            job_id.to_string(),
            request.template_code.clone(),
            request.version_semver.clone(),
        );
        event.error_code = Some(body.code.as_str());
        event.total_ms = timing.total_ms;
        event.steps = timing.steps.clone();
        self.audit.record(&event);
        self.metrics.record(&PipelineMetricEvent {
            outcome: PipelineOutcome::Error,
            error_code: Some(body.code),
            failed_stage: stage,
            duration: started.elapsed(),
        });
        JobResult::failure(job_id, body, timing, notes)
    }
}

// ============================================================================
// SECTION: Stage Helpers
// ============================================================================

/// Validates request shape and builds the template key.
fn validate_request(request: &ProcessRequest) -> Result<TemplateKey, ErrorBody> {
    let key = TemplateKey::new(
        request.template_code.clone(),
        request.version_semver.clone(),
        request.checksum_sha256.clone(),
    )
    .map_err(|err| {
        ErrorBody::new(
            ErrorCode::ManifestInvalid,
            "invalid request field",
            json!({"field": err.field(), "reason": err.to_string()}),
        )
    })?;
    if request.download_url.is_empty() {
        return Err(ErrorBody::new(
            ErrorCode::ManifestInvalid,
            "invalid request field",
            json!({"field": "downloadUrl", "reason": "must be a non-empty string"}),
        ));
    }
    if request.raw_path.is_empty() {
        return Err(ErrorBody::new(
            ErrorCode::ManifestInvalid,
            "invalid request field",
            json!({"field": "rawPath", "reason": "must be a non-empty string"}),
        ));
    }
    Ok(key)
}

/// Runs the manifest chain: load, validate, lift, verify assets.
fn load_and_verify(template_dir: &Path) -> Result<RuntimeSpec, ManifestError> {
    let doc = load_manifest(template_dir)?;
    validate_manifest(&doc)?;
    let spec = to_runtime_spec(&doc, template_dir)?;
    validate_assets(&spec)?;
    Ok(spec)
}

/// Decodes the raw image, renders, and encodes the PNG output.
fn render_stage(spec: &RuntimeSpec, raw_path: &str) -> Result<Vec<u8>, ErrorBody> {
    let path = Path::new(raw_path);
    if !path.is_file() {
        return Err(ErrorBody::new(
            ErrorCode::RenderFailed,
            "raw image not found",
            json!({"rawPath": raw_path}),
        ));
    }
    let raw = image::open(path)
        .map_err(|err| {
            ErrorBody::new(
                ErrorCode::RenderFailed,
                "raw image decode failed",
                json!({"reason": err.to_string()}),
            )
        })?
        .to_rgba8();
    let canvas = framepress_render::render(spec, &raw).map_err(|err| classify_render(&err))?;
    encode_png(&canvas).map_err(|reason| {
        ErrorBody::new(ErrorCode::RenderFailed, "output encode failed", json!({"reason": reason}))
    })
}

/// Encodes an RGBA canvas as PNG bytes.
fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    canvas
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| err.to_string())?;
    Ok(bytes)
}

/// Appends one entered-stage timing step.
fn push_step(timing: &mut Timing, name: StageName, started: Instant) {
    timing.steps.push(StepTiming {
        name,
        ms: elapsed_ms(started),
    });
}

/// Returns elapsed wall-clock milliseconds.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Error Classification
// ============================================================================

/// Maps resolver errors onto the wire taxonomy.
fn classify_resolve(err: &ResolveError) -> ErrorBody {
    match err {
        ResolveError::Download(reason) => ErrorBody::new(
            ErrorCode::TemplateDownloadFailed,
            "template download failed",
            json!({"reason": reason}),
        ),
        ResolveError::ChecksumMismatch { expected, actual } => ErrorBody::new(
            ErrorCode::TemplateChecksumMismatch,
            "template checksum mismatch",
            json!({"expected": expected, "actual": actual}),
        ),
        ResolveError::Extract(reason) => ErrorBody::new(
            ErrorCode::TemplateExtractError,
            "template extract failed",
            json!({"reason": reason}),
        ),
        ResolveError::InvalidTemplate(reason) => ErrorBody::new(
            ErrorCode::TemplateInvalid,
            "template package invalid",
            json!({"reason": reason}),
        ),
        ResolveError::Io(reason) => ErrorBody::new(
            ErrorCode::TemplateExtractError,
            "template cache io failed",
            json!({"reason": reason}),
        ),
    }
}

/// Maps manifest errors onto the wire taxonomy.
fn classify_manifest(err: &ManifestError) -> ErrorBody {
    match err {
        ManifestError::Load(reason) => ErrorBody::new(
            ErrorCode::ManifestLoadError,
            "manifest load failed",
            json!({"reason": reason}),
        ),
        ManifestError::Invalid { field, message } => ErrorBody::new(
            ErrorCode::ManifestInvalid,
            "manifest validation failed",
            json!({"field": field, "reason": message}),
        ),
        ManifestError::AssetNotFound { path, sticker_id } => ErrorBody::new(
            ErrorCode::AssetNotFound,
            "referenced asset missing on disk",
            json!({"path": path.display().to_string(), "stickerId": sticker_id}),
        ),
    }
}

/// Maps render errors onto the wire taxonomy.
fn classify_render(err: &RenderError) -> ErrorBody {
    ErrorBody::new(ErrorCode::RenderFailed, "render failed", json!({"reason": err.to_string()}))
}

/// Maps store errors onto the wire taxonomy.
fn classify_store(err: &framepress_core::StoreError, kind: OutputKind) -> ErrorBody {
    ErrorBody::new(
        ErrorCode::StoreFailed,
        "output store failed",
        json!({"kind": kind.as_str(), "reason": err.to_string()}),
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProcessRequest {
        ProcessRequest {
            template_code: "tpl_001".to_string(),
            version_semver: "0.1.0".to_string(),
            download_url: "http://127.0.0.1:9000/tpl.zip".to_string(),
            checksum_sha256: "a".repeat(64),
            raw_path: "/tmp/raw.jpg".to_string(),
        }
    }

    /// Tests request fields deserialize from camelCase.
    #[test]
    fn request_deserializes_from_camel_case() {
        let body = serde_json::json!({
            "templateCode": "tpl_001",
            "versionSemver": "0.1.0",
            "downloadUrl": "http://127.0.0.1:9000/tpl.zip",
            "checksumSha256": "a".repeat(64),
            "rawPath": "/tmp/raw.jpg"
        });
        let decoded: ProcessRequest = serde_json::from_value(body).expect("decode");
        assert_eq!(decoded.template_code, "tpl_001");
        assert_eq!(decoded.raw_path, "/tmp/raw.jpg");
    }

    /// Tests a well-formed request yields a key.
    #[test]
    fn well_formed_request_yields_key() {
        let key = validate_request(&request()).expect("key");
        assert_eq!(key.template_code.as_str(), "tpl_001");
    }

    /// Tests request-shape violations name the offending field.
    #[test]
    fn request_violations_name_the_field() {
        let mut bad = request();
        bad.checksum_sha256 = "UPPERCASE".to_string();
        let body = validate_request(&bad).unwrap_err();
        assert_eq!(body.code, ErrorCode::ManifestInvalid);
        assert!(!body.retryable);
        assert_eq!(body.detail["field"], "checksumSha256");

        let mut bad = request();
        bad.download_url.clear();
        let body = validate_request(&bad).unwrap_err();
        assert_eq!(body.detail["field"], "downloadUrl");

        let mut bad = request();
        bad.raw_path.clear();
        let body = validate_request(&bad).unwrap_err();
        assert_eq!(body.detail["field"], "rawPath");
    }

    /// Tests resolver errors keep their retryability through classification.
    #[test]
    fn resolve_classification_preserves_retryability() {
        let body = classify_resolve(&ResolveError::Download("connect refused".to_string()));
        assert_eq!(body.code, ErrorCode::TemplateDownloadFailed);
        assert!(body.retryable);

        let body = classify_resolve(&ResolveError::ChecksumMismatch {
            expected: "a".repeat(64),
            actual: "b".repeat(64),
        });
        assert_eq!(body.code, ErrorCode::TemplateChecksumMismatch);
        assert!(!body.retryable);
        assert_eq!(body.detail["expected"], serde_json::json!("a".repeat(64)));

        let body = classify_resolve(&ResolveError::InvalidTemplate("no manifest".to_string()));
        assert_eq!(body.code, ErrorCode::TemplateInvalid);
    }

    /// Tests manifest errors split into load, invalid, and asset codes.
    #[test]
    fn manifest_classification_splits_sub_kinds() {
        let body = classify_manifest(&ManifestError::Load("parse failed".to_string()));
        assert_eq!(body.code, ErrorCode::ManifestLoadError);

        let body = classify_manifest(&ManifestError::Invalid {
            field: "output.width".to_string(),
            message: "must be a positive integer".to_string(),
        });
        assert_eq!(body.code, ErrorCode::ManifestInvalid);
        assert_eq!(body.detail["field"], "output.width");

        let body = classify_manifest(&ManifestError::AssetNotFound {
            path: "/cache/tpl/assets/bg.png".into(),
            sticker_id: None,
        });
        assert_eq!(body.code, ErrorCode::AssetNotFound);
        assert_eq!(body.detail["path"], "/cache/tpl/assets/bg.png");
    }
}
