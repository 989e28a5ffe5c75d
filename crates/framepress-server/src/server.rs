// crates/framepress-server/src/server.rs
// ============================================================================
// Module: HTTP Surface
// Description: axum routes for processing, static outputs, and health.
// Purpose: Expose the pipeline over HTTP without ever surfacing a 5xx.
// Dependencies: axum, framepress-core, tokio
// ============================================================================

//! ## Overview
//! The server exposes three routes: `POST /pipeline/v2/process` (always
//! answers 200 with a [`JobResult`] body), `GET /files/{kind}/{jobId}/{name}`
//! (static outputs), and `GET /pipeline/v2/health`. The pipeline is
//! synchronous per request and runs inside `spawn_blocking`; the handler is
//! the only place a panic or body-decode failure is converted into an
//! `INTERNAL_ERROR` envelope.
//! Invariants:
//! - No request path produces a non-200 response on `/pipeline/v2/process`.
//! - File serving never escapes the data directory.
//!
//! Security posture: request bodies and file path segments are untrusted;
//! see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path as UrlPath;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use framepress_core::ErrorBody;
use framepress_core::ErrorCode;
use framepress_core::JobId;
use framepress_core::JobResult;
use framepress_core::Timing;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::StderrJobAuditSink;
use crate::config::FramepressConfig;
use crate::metrics::NoopMetrics;
use crate::pipeline::Pipeline;
use crate::pipeline::ProcessRequest;
use crate::storage::LocalOutputStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server lifecycle errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A subsystem failed to initialize.
    #[error("server init failed: {0}")]
    Init(String),
    /// The listener could not bind.
    #[error("server bind failed: {0}")]
    Bind(String),
    /// The server loop failed.
    #[error("server failed: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared per-process server state.
pub struct AppState {
    /// Pipeline orchestrator.
    pub pipeline: Pipeline,
    /// Root directory for stored outputs.
    pub data_dir: PathBuf,
}

/// Builds the application state from validated configuration.
///
/// # Errors
///
/// Returns [`ServerError::Init`] when a subsystem cannot be constructed.
pub fn build_state(config: &FramepressConfig) -> Result<AppState, ServerError> {
    let store = Arc::new(LocalOutputStore::new(
        config.storage.data_dir.clone(),
        config.server.public_base_url.clone(),
    ));
    let pipeline = Pipeline::new(
        config,
        store,
        Arc::new(StderrJobAuditSink),
        Arc::new(NoopMetrics),
    )
    .map_err(|err| ServerError::Init(err.to_string()))?;
    Ok(AppState {
        pipeline,
        data_dir: config.storage.data_dir.clone(),
    })
}

/// Builds the router over shared state.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/pipeline/v2/process", post(handle_process))
        .route("/pipeline/v2/health", get(handle_health))
        .route("/files/{kind}/{job_id}/{name}", get(handle_file))
        .with_state(state)
}

/// Runs the server until the listener fails.
///
/// # Errors
///
/// Returns [`ServerError`] when initialization, binding, or serving fails.
pub async fn serve(config: FramepressConfig) -> Result<(), ServerError> {
    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|_| ServerError::Bind(format!("invalid bind address: {}", config.server.bind)))?;
    // The resolver owns a blocking HTTP client; build it off the runtime.
    let state = tokio::task::spawn_blocking(move || build_state(&config))
        .await
        .map_err(|err| ServerError::Init(err.to_string()))??;
    let state = Arc::new(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| ServerError::Bind(err.to_string()))?;
    axum::serve(listener, build_router(state))
        .await
        .map_err(|err| ServerError::Serve(err.to_string()))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles `POST /pipeline/v2/process`. Always answers HTTP 200.
pub async fn handle_process(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<JobResult>) {
    let job_id = state.pipeline.issue_job_id();
    let request: ProcessRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return (StatusCode::OK, Json(decode_failure(job_id, &err)));
        }
    };

    let fallback_id = job_id.clone();
    let worker = Arc::clone(&state);
    let result =
        tokio::task::spawn_blocking(move || worker.pipeline.process_with_job_id(job_id, &request))
            .await;
    match result {
        Ok(result) => (StatusCode::OK, Json(result)),
        // A panicked stage still answers 200 with a stable internal error.
        Err(_) => (StatusCode::OK, Json(internal_failure(fallback_id))),
    }
}

/// Handles `GET /pipeline/v2/health`.
pub async fn handle_health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "framepress",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handles `GET /files/{kind}/{job_id}/{name}`.
pub async fn handle_file(
    State(state): State<Arc<AppState>>,
    UrlPath((kind, job_id, name)): UrlPath<(String, String, String)>,
) -> Response {
    if kind != "preview" && kind != "final" {
        return StatusCode::NOT_FOUND.into_response();
    }
    if !is_safe_component(&job_id) || !is_safe_component(&name) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let path = state.data_dir.join(&kind).join(&job_id).join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Returns true when a path segment cannot navigate the filesystem.
fn is_safe_component(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\\')
}

// ============================================================================
// SECTION: Failure Envelopes
// ============================================================================

/// Builds the envelope for an undecodable request body.
fn decode_failure(job_id: JobId, err: &serde_json::Error) -> JobResult {
    JobResult::failure(
        job_id,
        ErrorBody::new(
            ErrorCode::InternalError,
            "request body decode failed",
            json!({"reason": err.to_string()}),
        ),
        Timing::default(),
        Vec::new(),
    )
}

/// Builds the envelope for an unmapped server-side failure.
fn internal_failure(job_id: JobId) -> JobResult {
    JobResult::failure(
        job_id,
        ErrorBody::new(ErrorCode::InternalError, "internal error", Value::Null),
        Timing::default(),
        Vec::new(),
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
