// crates/framepress-server/src/storage.rs
// ============================================================================
// Module: Local Output Store
// Description: Filesystem-backed output storage with URL minting.
// Purpose: Persist preview/final bytes atomically under the data directory.
// Dependencies: framepress-core
// ============================================================================

//! ## Overview
//! [`LocalOutputStore`] writes outputs to
//! `{data_dir}/{kind}/{jobId}/{kind}.png` via a temp file and atomic
//! rename, and mints `{publicBaseUrl}/files/{kind}/{jobId}/{kind}.png`
//! URLs. The URL shape is a frozen system boundary.
//! Invariants:
//! - A partially written output is never visible at the final path.
//! - The temp file is removed on every failure path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use framepress_core::JobId;
use framepress_core::OutputKind;
use framepress_core::OutputStore;
use framepress_core::StoreError;
use framepress_core::StoredOutput;

// ============================================================================
// SECTION: Local Store
// ============================================================================

/// Filesystem-backed output store.
pub struct LocalOutputStore {
    /// Root directory for stored outputs.
    data_dir: PathBuf,
    /// Base URL minted into output links (no trailing slash).
    public_base_url: String,
}

impl LocalOutputStore {
    /// Builds a store rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

impl OutputStore for LocalOutputStore {
    fn store_output(
        &self,
        job_id: &JobId,
        kind: OutputKind,
        bytes: &[u8],
    ) -> Result<StoredOutput, StoreError> {
        if job_id.as_str().is_empty() {
            return Err(StoreError::Invalid("job id must not be empty".to_string()));
        }
        let kind_dir = self.data_dir.join(kind.as_str()).join(job_id.as_str());
        fs::create_dir_all(&kind_dir).map_err(|err| StoreError::Io(err.to_string()))?;

        let file_name = format!("{}.png", kind.as_str());
        let final_path = kind_dir.join(&file_name);
        let tmp_path = kind_dir.join(format!("{file_name}.tmp"));

        if let Err(err) = fs::write(&tmp_path, bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io(err.to_string()));
        }
        if let Err(err) = fs::rename(&tmp_path, &final_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io(err.to_string()));
        }

        let url = format!(
            "{}/files/{}/{}/{}",
            self.public_base_url,
            kind.as_str(),
            job_id,
            file_name
        );
        Ok(StoredOutput {
            path: final_path,
            url,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests outputs land at the frozen path and URL shape.
    #[test]
    fn outputs_land_at_frozen_path_and_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalOutputStore::new(dir.path(), "http://localhost:9002");
        let job_id = JobId::new("job_1_deadbeef");

        let stored = store.store_output(&job_id, OutputKind::Final, b"png bytes").expect("store");
        assert_eq!(stored.path, dir.path().join("final/job_1_deadbeef/final.png"));
        assert_eq!(stored.url, "http://localhost:9002/files/final/job_1_deadbeef/final.png");
        assert_eq!(std::fs::read(&stored.path).expect("read back"), b"png bytes");

        let preview =
            store.store_output(&job_id, OutputKind::Preview, b"png bytes").expect("store preview");
        assert_eq!(preview.url, "http://localhost:9002/files/preview/job_1_deadbeef/preview.png");
    }

    /// Tests no temp file survives a successful store.
    #[test]
    fn no_temp_file_survives_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalOutputStore::new(dir.path(), "http://localhost:9002");
        let job_id = JobId::new("job_2_0badcafe");
        store.store_output(&job_id, OutputKind::Preview, b"bytes").expect("store");
        let kind_dir = dir.path().join("preview/job_2_0badcafe");
        let names: Vec<_> = std::fs::read_dir(&kind_dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["preview.png".to_string()]);
    }

    /// Tests empty job identifiers are rejected.
    #[test]
    fn empty_job_id_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalOutputStore::new(dir.path(), "http://localhost:9002");
        let err = store.store_output(&JobId::new(""), OutputKind::Final, b"x").unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }
}
