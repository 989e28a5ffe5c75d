// crates/framepress-resolver/src/resolver.rs
// ============================================================================
// Module: Template Resolver
// Description: Cache lookup, download, verification, and atomic publication.
// Purpose: Resolve a template key to an extracted directory exactly once.
// Dependencies: framepress-core, reqwest
// ============================================================================

//! ## Overview
//! [`TemplateResolver::resolve`] implements the acquisition pipeline: fast
//! cache probe, per-key single-flight lock, double-checked probe under the
//! lock, streaming download to a sibling temp file, SHA-256 verification,
//! extraction into a sibling staging directory, and atomic rename into the
//! final content-addressed location.
//! Invariants:
//! - The atomic rename happens before the per-key lock is released.
//! - On a lost publication race the existing directory wins and the staging
//!   copy is discarded.
//! - Cleanup failures never mask the primary error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::PoisonError;
use std::time::Duration;

use framepress_core::TemplateKey;
use framepress_core::hashing::sha256_hex_file;
use framepress_core::manifest::MANIFEST_FILE_NAME;
use thiserror::Error;

use crate::archive::extract_archive;
use crate::download::TemplateFetcher;
use crate::singleflight::key_lock;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default connect timeout for template downloads.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default total read timeout for template downloads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while resolving a template.
///
/// # Invariants
/// - Variants map 1:1 onto the `TEMPLATE_*` wire codes; `Io` shares the
///   extract classification.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Download failed: non-2xx status, connection failure, or timeout.
    #[error("template download failed: {0}")]
    Download(String),
    /// Computed archive digest differs from the declared checksum.
    #[error("template checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch {
        /// Checksum declared in the request.
        expected: String,
        /// Checksum computed over the downloaded archive.
        actual: String,
    },
    /// Archive is malformed, attempts traversal, or failed to extract.
    #[error("template extract failed: {0}")]
    Extract(String),
    /// Extracted archive lacks `manifest.json` at its root.
    #[error("template invalid: {0}")]
    InvalidTemplate(String),
    /// Cache filesystem operation failed.
    #[error("template cache io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Resolver Types
// ============================================================================

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Root directory of the content-addressed cache.
    pub cache_root: PathBuf,
    /// Connect timeout for downloads.
    pub connect_timeout: Duration,
    /// Total read timeout for downloads.
    pub read_timeout: Duration,
}

impl ResolverConfig {
    /// Builds a configuration with default timeouts.
    #[must_use]
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// How a resolved template directory was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The entry was already published.
    CacheHit,
    /// The entry was downloaded, verified, and published by this call.
    Downloaded,
}

/// A published template directory.
///
/// # Invariants
/// - `dir` contains `manifest.json` at its root and is never mutated.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    /// Absolute path of the published template directory.
    pub dir: PathBuf,
    /// Whether the network was hit by this call.
    pub outcome: ResolveOutcome,
}

/// Content-addressed template resolver.
pub struct TemplateResolver {
    /// Cache root directory.
    cache_root: PathBuf,
    /// HTTP fetcher for template archives.
    fetcher: TemplateFetcher,
}

impl TemplateResolver {
    /// Builds a resolver, constructing the HTTP client once.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Download`] when the client cannot be built.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        let fetcher = TemplateFetcher::new(config.connect_timeout, config.read_timeout)?;
        Ok(Self {
            cache_root: config.cache_root,
            fetcher,
        })
    }

    /// Returns the final directory for a key.
    #[must_use]
    pub fn final_dir(&self, key: &TemplateKey) -> PathBuf {
        self.cache_root.join(key.cache_rel_path())
    }

    /// Resolves a template key to a published directory.
    ///
    /// Cache hits return without any network I/O. Misses download, verify,
    /// extract, and publish under the key's single-flight lock.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when any acquisition step fails.
    pub fn resolve(
        &self,
        key: &TemplateKey,
        download_url: &str,
    ) -> Result<ResolvedTemplate, ResolveError> {
        let final_dir = self.final_dir(key);

        // Fast path: published entries are immutable, no lock needed.
        if is_published(&final_dir) {
            return Ok(ResolvedTemplate {
                dir: final_dir,
                outcome: ResolveOutcome::CacheHit,
            });
        }

        let lock = key_lock(&key.lock_key());
        let _flight = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Double check: another caller may have published while we waited.
        if is_published(&final_dir) {
            return Ok(ResolvedTemplate {
                dir: final_dir,
                outcome: ResolveOutcome::CacheHit,
            });
        }

        self.acquire(key, download_url, &final_dir)?;
        Ok(ResolvedTemplate {
            dir: final_dir,
            outcome: ResolveOutcome::Downloaded,
        })
    }

    /// Downloads, verifies, extracts, and publishes one template entry.
    ///
    /// Must be called with the key's single-flight lock held.
    fn acquire(
        &self,
        key: &TemplateKey,
        download_url: &str,
        final_dir: &Path,
    ) -> Result<(), ResolveError> {
        let parent = final_dir
            .parent()
            .ok_or_else(|| ResolveError::Io("cache entry has no parent directory".to_string()))?;
        fs::create_dir_all(parent).map_err(|err| ResolveError::Io(err.to_string()))?;

        let zip_tmp = parent.join(format!("{}.zip.tmp", key.checksum_sha256));
        let _zip_guard = TempFileGuard::new(zip_tmp.clone());
        self.fetcher.fetch_to_file(download_url, &zip_tmp)?;

        let actual = sha256_hex_file(&zip_tmp).map_err(|err| ResolveError::Io(err.to_string()))?;
        if actual != key.checksum_sha256.as_str() {
            return Err(ResolveError::ChecksumMismatch {
                expected: key.checksum_sha256.as_str().to_string(),
                actual,
            });
        }

        let staging = staging_dir(final_dir);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|err| ResolveError::Io(err.to_string()))?;
        }
        let mut staging_guard = TempDirGuard::new(staging.clone());
        extract_archive(&zip_tmp, &staging)?;

        if !staging.join(MANIFEST_FILE_NAME).is_file() {
            return Err(ResolveError::InvalidTemplate(format!(
                "{MANIFEST_FILE_NAME} not found in extracted template"
            )));
        }

        match fs::rename(&staging, final_dir) {
            Ok(()) => {
                staging_guard.disarm();
                Ok(())
            }
            // Lost race: a concurrent publisher won; keep the existing entry
            // and let the guard discard the staging copy.
            Err(_) if is_published(final_dir) => Ok(()),
            Err(err) => Err(ResolveError::Io(format!("cache publish failed: {err}"))),
        }
    }
}

/// Returns the sibling staging directory for a final directory.
fn staging_dir(final_dir: &Path) -> PathBuf {
    let mut name = final_dir.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Returns true when the entry is published (`manifest.json` present).
fn is_published(final_dir: &Path) -> bool {
    final_dir.join(MANIFEST_FILE_NAME).is_file()
}

// ============================================================================
// SECTION: Cleanup Guards
// ============================================================================

/// Removes a temp file on drop; removal failures are swallowed.
struct TempFileGuard {
    /// File to remove.
    path: PathBuf,
}

impl TempFileGuard {
    const fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Removes a staging directory on drop unless disarmed after publication.
struct TempDirGuard {
    /// Directory to remove.
    path: PathBuf,
    /// Whether the guard is still responsible for cleanup.
    armed: bool,
}

impl TempDirGuard {
    const fn new(path: PathBuf) -> Self {
        Self {
            path,
            armed: true,
        }
    }

    /// Releases ownership after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
