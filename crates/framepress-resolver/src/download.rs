// crates/framepress-resolver/src/download.rs
// ============================================================================
// Module: Template Download
// Description: Streaming HTTP fetch of template archives to temp files.
// Purpose: Download archives with bounded timeouts, failing closed.
// Dependencies: reqwest, url
// ============================================================================

//! ## Overview
//! [`TemplateFetcher`] wraps a blocking HTTP client with explicit connect
//! and total-read timeouts and streams response bodies straight to disk so
//! archives never load into memory.
//! Invariants:
//! - Only `http` and `https` URLs are accepted.
//! - Non-success statuses, connection failures, and timeouts fail closed as
//!   download errors (retryable at the pipeline boundary).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use crate::resolver::ResolveError;

// ============================================================================
// SECTION: Template Fetcher
// ============================================================================

/// Streaming archive fetcher.
#[derive(Debug, Clone)]
pub struct TemplateFetcher {
    /// HTTP client used for archive downloads.
    client: Client,
}

impl TemplateFetcher {
    /// Builds a fetcher with the provided timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Download`] when the client cannot be built.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|err| ResolveError::Download(err.to_string()))?;
        Ok(Self {
            client,
        })
    }

    /// Downloads `url` to `dest`, streaming the body.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Download`] on scheme, connection, status, or
    /// stream failures, and [`ResolveError::Io`] when `dest` cannot be
    /// created.
    pub fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<(), ResolveError> {
        let parsed =
            Url::parse(url).map_err(|err| ResolveError::Download(format!("invalid url: {err}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ResolveError::Download(format!("unsupported url scheme: {scheme}")));
            }
        }
        let mut response = self
            .client
            .get(parsed)
            .send()
            .map_err(|err| ResolveError::Download(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ResolveError::Download(format!("http status {}", response.status())));
        }
        let mut file = File::create(dest).map_err(|err| ResolveError::Io(err.to_string()))?;
        io::copy(&mut response, &mut file)
            .map_err(|err| ResolveError::Download(format!("download stream failed: {err}")))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> TemplateFetcher {
        TemplateFetcher::new(Duration::from_millis(500), Duration::from_secs(2)).expect("fetcher")
    }

    /// Tests non-http schemes are rejected before any request is sent.
    #[test]
    fn non_http_schemes_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("out.zip.tmp");
        let err = fetcher().fetch_to_file("file:///etc/hosts", &dest).unwrap_err();
        assert!(matches!(err, ResolveError::Download(ref msg) if msg.contains("scheme")));
        assert!(!dest.exists());
    }

    /// Tests unparseable URLs are rejected.
    #[test]
    fn malformed_urls_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = fetcher().fetch_to_file("not a url", &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, ResolveError::Download(_)));
    }
}
