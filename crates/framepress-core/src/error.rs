// crates/framepress-core/src/error.rs
// ============================================================================
// Module: Framepress Error Taxonomy
// Description: Closed error code set with per-code retryability.
// Purpose: Give clients a stable failure contract across every stage.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every failure a client can observe is one of the [`ErrorCode`] variants.
//! The set is closed: stage implementations raise their own typed errors and
//! the pipeline orchestrator is the only place those are mapped onto the
//! wire taxonomy. Retryability is a property of the code, never of the
//! individual failure.
//! Invariants:
//! - `TEMPLATE_DOWNLOAD_FAILED` and `STORE_FAILED` are the only retryable
//!   codes.
//! - Wire strings are stable SCREAMING_SNAKE_CASE labels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Closed set of wire-visible error codes.
///
/// # Invariants
/// - Variants are stable for programmatic client handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// HTTP non-2xx, connect failure, or timeout while fetching a template.
    TemplateDownloadFailed,
    /// Computed archive SHA-256 differs from the declared checksum.
    TemplateChecksumMismatch,
    /// Malformed archive, traversal attempt, or I/O during extraction.
    TemplateExtractError,
    /// Extracted template directory lacks `manifest.json`.
    TemplateInvalid,
    /// `manifest.json` missing or unparseable.
    ManifestLoadError,
    /// Manifest structural validation failed.
    ManifestInvalid,
    /// Referenced background or sticker file missing on disk.
    AssetNotFound,
    /// Compositing failed, including raw-image decode.
    RenderFailed,
    /// Persisting an output failed.
    StoreFailed,
    /// Any unmapped failure.
    InternalError,
}

impl ErrorCode {
    /// Returns the stable wire label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TemplateDownloadFailed => "TEMPLATE_DOWNLOAD_FAILED",
            Self::TemplateChecksumMismatch => "TEMPLATE_CHECKSUM_MISMATCH",
            Self::TemplateExtractError => "TEMPLATE_EXTRACT_ERROR",
            Self::TemplateInvalid => "TEMPLATE_INVALID",
            Self::ManifestLoadError => "MANIFEST_LOAD_ERROR",
            Self::ManifestInvalid => "MANIFEST_INVALID",
            Self::AssetNotFound => "ASSET_NOT_FOUND",
            Self::RenderFailed => "RENDER_FAILED",
            Self::StoreFailed => "STORE_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns whether reissuing the identical request may succeed.
    #[must_use]
    pub const fn retryable(self) -> bool {
        matches!(self, Self::TemplateDownloadFailed | Self::StoreFailed)
    }
}

// ============================================================================
// SECTION: Error Body
// ============================================================================

/// Wire error payload carried by failure envelopes.
///
/// # Invariants
/// - `retryable` always equals `code.retryable()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Closed-taxonomy error code.
    pub code: ErrorCode,
    /// Short, stable human-readable message.
    pub message: String,
    /// Retry hint derived from the code.
    pub retryable: bool,
    /// Structured detail (for example `{expected, actual}` checksums).
    #[serde(default)]
    pub detail: Value,
}

impl ErrorBody {
    /// Builds an error body; retryability follows the code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, detail: Value) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.retryable(),
            detail,
        }
    }
}

// ============================================================================
// SECTION: Stage Names
// ============================================================================

/// Pipeline stages recorded in response timing.
///
/// # Invariants
/// - Variants are stable for timing step labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageName {
    /// Template acquisition and cache publication.
    TemplateResolve,
    /// Manifest load, validation, lift, and asset verification.
    ManifestLoad,
    /// Raw decode and compositing.
    Render,
    /// Output persistence and URL minting.
    Store,
}

impl StageName {
    /// Returns the stable wire label for the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TemplateResolve => "TEMPLATE_RESOLVE",
            Self::ManifestLoad => "MANIFEST_LOAD",
            Self::Render => "RENDER",
            Self::Store => "STORE",
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
