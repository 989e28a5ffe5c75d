// crates/framepress-core/src/identifiers.rs
// ============================================================================
// Module: Framepress Identifiers
// Description: Canonical identifiers for templates, cache entries, and jobs.
// Purpose: Provide strongly typed identifiers with stable wire forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the identifiers used throughout Framepress. The
//! content address of a cached template is a [`TemplateKey`]: two keys that
//! differ only in checksum are distinct cache entries. Key components are
//! validated at construction; once a [`TemplateKey`] exists it is well
//! formed by construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when constructing a [`TemplateKey`].
///
/// # Invariants
/// - Variants are stable; each names the offending request field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Template code is empty.
    #[error("templateCode must be a non-empty string")]
    EmptyTemplateCode,
    /// Version is empty or not MAJOR.MINOR.PATCH.
    #[error("versionSemver must be MAJOR.MINOR.PATCH, got {0:?}")]
    InvalidVersion(String),
    /// Checksum is not 64 lowercase hex characters.
    #[error("checksumSha256 must be 64 lowercase hex characters")]
    InvalidChecksum,
}

impl KeyError {
    /// Returns the request field name the error refers to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyTemplateCode => "templateCode",
            Self::InvalidVersion(_) => "versionSemver",
            Self::InvalidChecksum => "checksumSha256",
        }
    }
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Template identifier code (for example `tpl_001`).
///
/// # Invariants
/// - Opaque UTF-8 string; non-empty when reached via [`TemplateKey::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateCode(String);

impl TemplateCode {
    /// Creates a new template code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Template version in `MAJOR.MINOR.PATCH` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionSemver(String);

impl VersionSemver {
    /// Creates a new version without shape validation.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionSemver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase hex SHA-256 checksum of a template archive.
///
/// # Invariants
/// - Exactly 64 lowercase hex characters (enforced by [`ChecksumSha256::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChecksumSha256(String);

impl ChecksumSha256 {
    /// Parses a checksum, enforcing the 64-lowercase-hex shape.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidChecksum`] when the shape is violated.
    pub fn parse(raw: impl Into<String>) -> Result<Self, KeyError> {
        let raw = raw.into();
        let well_formed = raw.len() == 64
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(KeyError::InvalidChecksum);
        }
        Ok(Self(raw))
    }

    /// Returns the checksum as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChecksumSha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job identifier minted per pipeline request.
///
/// # Invariants
/// - Opaque; the server mints `job_{unix_millis}_{8 lowercase hex}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new job identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Template Key
// ============================================================================

/// Content address of a cached template entry.
///
/// # Invariants
/// - All components are validated at construction.
/// - Keys differing in any component address distinct cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateKey {
    /// Template identifier code.
    pub template_code: TemplateCode,
    /// Template version (`MAJOR.MINOR.PATCH`).
    pub version_semver: VersionSemver,
    /// Expected SHA-256 of the template archive.
    pub checksum_sha256: ChecksumSha256,
}

impl TemplateKey {
    /// Builds a validated template key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when a component is empty or malformed.
    pub fn new(
        template_code: impl Into<String>,
        version_semver: impl Into<String>,
        checksum_sha256: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let template_code = template_code.into();
        if template_code.is_empty() {
            return Err(KeyError::EmptyTemplateCode);
        }
        let version_semver = version_semver.into();
        if !is_semver(&version_semver) {
            return Err(KeyError::InvalidVersion(version_semver));
        }
        let checksum_sha256 = ChecksumSha256::parse(checksum_sha256)?;
        Ok(Self {
            template_code: TemplateCode::new(template_code),
            version_semver: VersionSemver::new(version_semver),
            checksum_sha256,
        })
    }

    /// Returns the cache-relative path `{code}/{version}/{checksum}`.
    #[must_use]
    pub fn cache_rel_path(&self) -> PathBuf {
        PathBuf::from(self.template_code.as_str())
            .join(self.version_semver.as_str())
            .join(self.checksum_sha256.as_str())
    }

    /// Returns the single-flight lock key `{code}:{version}:{checksum}`.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("{}:{}:{}", self.template_code, self.version_semver, self.checksum_sha256)
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock_key())
    }
}

/// Returns true when the value is `MAJOR.MINOR.PATCH` with numeric parts.
fn is_semver(value: &str) -> bool {
    let mut parts = 0usize;
    for part in value.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts == 3
}

// ============================================================================
// SECTION: Tests
// ============================================================================
