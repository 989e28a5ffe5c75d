// crates/framepress-core/src/store.rs
// ============================================================================
// Module: Framepress Output Store Interface
// Description: Storage seam for rendered pipeline outputs.
// Purpose: Persist preview/final bytes and mint public URLs.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The pipeline hands encoded output bytes to an [`OutputStore`] and receives
//! back the stored path and the public URL. The URL shape
//! `{publicBaseUrl}/files/{kind}/{jobId}/{kind}.png` is a frozen system
//! boundary; implementations must not change it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

use crate::identifiers::JobId;

// ============================================================================
// SECTION: Output Kinds
// ============================================================================

/// Kind of stored output.
///
/// # Invariants
/// - Labels are stable path and URL segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Preview-resolution output.
    Preview,
    /// Final-resolution output.
    Final,
}

impl OutputKind {
    /// Returns the stable path segment for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Final => "final",
        }
    }
}

// ============================================================================
// SECTION: Store Types
// ============================================================================

/// Location of a stored output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    /// Absolute filesystem path of the stored bytes.
    pub path: PathBuf,
    /// Public URL under the static file endpoint.
    pub url: String,
}

/// Output store errors.
///
/// # Invariants
/// - Variants are stable for error classification; all map to `STORE_FAILED`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage I/O failed.
    #[error("output store io error: {0}")]
    Io(String),
    /// Store request was invalid.
    #[error("output store invalid request: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Output Store
// ============================================================================

/// Storage backend for rendered outputs.
pub trait OutputStore: Send + Sync {
    /// Persists output bytes for a job and returns the stored location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn store_output(
        &self,
        job_id: &JobId,
        kind: OutputKind,
        bytes: &[u8],
    ) -> Result<StoredOutput, StoreError>;
}
