// crates/framepress-resolver/src/archive.rs
// ============================================================================
// Module: Template Archive Extraction
// Description: ZIP extraction into a staging directory.
// Purpose: Unpack untrusted archives while rejecting directory traversal.
// Dependencies: zip
// ============================================================================

//! ## Overview
//! Template packages are ZIP archives. Extraction targets a staging
//! directory owned by the caller; publication is the caller's atomic
//! rename. Every entry name is validated to stay inside the staging root —
//! entries carrying `..` components or absolute paths fail the whole
//! extraction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::resolver::ResolveError;

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts a ZIP archive into `dest`, creating it if needed.
///
/// # Errors
///
/// Returns [`ResolveError::Extract`] when the archive is malformed, an
/// entry would escape `dest`, or any I/O fails during extraction.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<(), ResolveError> {
    let file = File::open(archive_path)
        .map_err(|err| ResolveError::Extract(format!("archive open failed: {err}")))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| ResolveError::Extract(format!("invalid zip archive: {err}")))?;
    fs::create_dir_all(dest)
        .map_err(|err| ResolveError::Extract(format!("staging dir create failed: {err}")))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| ResolveError::Extract(format!("zip entry {index} unreadable: {err}")))?;
        let rel_path = entry.enclosed_name().map(|path| path.to_owned()).ok_or_else(|| {
            ResolveError::Extract(format!("zip entry escapes archive root: {}", entry.name()))
        })?;
        let target = dest.join(rel_path);
        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| ResolveError::Extract(format!("dir create failed: {err}")))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| ResolveError::Extract(format!("dir create failed: {err}")))?;
        }
        let mut out = File::create(&target)
            .map_err(|err| ResolveError::Extract(format!("file create failed: {err}")))?;
        io::copy(&mut entry, &mut out)
            .map_err(|err| ResolveError::Extract(format!("entry write failed: {err}")))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
