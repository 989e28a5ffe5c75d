// crates/framepress-server/src/config.rs
// ============================================================================
// Module: Framepress Configuration
// Description: Configuration loading and validation for the Framepress service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits, then
//! overlaid with `FRAMEPRESS_*` environment variables. Every setting has a
//! default, so a missing config file yields a runnable service; an
//! explicitly named file that cannot be read fails closed.
//! Invariants:
//! - `validate` rejects unparseable bind addresses, malformed base URLs,
//!   and timeouts outside the hard bounds.
//! - The public base URL never carries a trailing slash after validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "framepress.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FRAMEPRESS_CONFIG";
/// Environment variable overriding the bind address.
pub const BIND_ENV_VAR: &str = "FRAMEPRESS_BIND";
/// Environment variable overriding the public base URL.
pub const PUBLIC_BASE_URL_ENV_VAR: &str = "FRAMEPRESS_PUBLIC_BASE_URL";
/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV_VAR: &str = "FRAMEPRESS_DATA_DIR";
/// Environment variable overriding the template cache root.
pub const CACHE_ROOT_ENV_VAR: &str = "FRAMEPRESS_CACHE_ROOT";
/// Environment variable overriding the download connect timeout.
pub const CONNECT_TIMEOUT_ENV_VAR: &str = "FRAMEPRESS_CONNECT_TIMEOUT_MS";
/// Environment variable overriding the download read timeout.
pub const READ_TIMEOUT_ENV_VAR: &str = "FRAMEPRESS_READ_TIMEOUT_MS";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
/// Minimum allowed download connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum allowed download connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Minimum allowed download read timeout in milliseconds.
pub(crate) const MIN_READ_TIMEOUT_MS: u64 = 1_000;
/// Maximum allowed download read timeout in milliseconds.
pub(crate) const MAX_READ_TIMEOUT_MS: u64 = 300_000;
/// Default bind address.
const DEFAULT_BIND: &str = "127.0.0.1:9002";
/// Default public base URL.
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:9002";
/// Default data directory.
const DEFAULT_DATA_DIR: &str = "./data";
/// Default template cache subdirectory under the data directory.
const DEFAULT_CACHE_SUBDIR: &str = "_templates";
/// Default download connect timeout in milliseconds.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
/// Default download read timeout in milliseconds.
const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named config file does not exist.
    #[error("config file not found: {0}")]
    Missing(PathBuf),
    /// Config file could not be read.
    #[error("config read failed: {0}")]
    Io(String),
    /// Config file exceeds the size cap.
    #[error("config file exceeds {limit} bytes (actual {actual})")]
    TooLarge {
        /// Maximum allowed bytes.
        limit: u64,
        /// Observed size in bytes.
        actual: u64,
    },
    /// Config file is not valid TOML.
    #[error("config parse failed: {0}")]
    Parse(String),
    /// A setting failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Framepress service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramepressConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Output storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Template cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Template download configuration.
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Default for FramepressConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the server binds.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL minted into output links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// Output storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored outputs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Template cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root; defaults to `{data_dir}/_templates` when unset.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Template download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total read timeout in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

const fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl FramepressConfig {
    /// Loads configuration from a TOML file plus environment overrides.
    ///
    /// Resolution order: explicit `path` argument, then the
    /// `FRAMEPRESS_CONFIG` environment variable, then `framepress.toml` in
    /// the working directory. A missing implicit file yields defaults; a
    /// missing explicit file fails closed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        let (resolved, explicit) = match (path, env_path) {
            (Some(path), _) => (path.to_path_buf(), true),
            (None, Some(path)) => (path, true),
            (None, None) => (PathBuf::from(DEFAULT_CONFIG_NAME), false),
        };

        let mut config = if resolved.is_file() {
            Self::from_file(&resolved)?
        } else if explicit {
            return Err(ConfigError::Missing(resolved));
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML file with a size cap.
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let metadata = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                limit: MAX_CONFIG_FILE_SIZE,
                actual: metadata.len(),
            });
        }
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies `FRAMEPRESS_*` environment overrides on top of file values.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(bind) = env::var(BIND_ENV_VAR) {
            self.server.bind = bind;
        }
        if let Ok(base_url) = env::var(PUBLIC_BASE_URL_ENV_VAR) {
            self.server.public_base_url = base_url;
        }
        if let Ok(data_dir) = env::var(DATA_DIR_ENV_VAR) {
            self.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(cache_root) = env::var(CACHE_ROOT_ENV_VAR) {
            self.cache.root = Some(PathBuf::from(cache_root));
        }
        if let Ok(connect) = env::var(CONNECT_TIMEOUT_ENV_VAR) {
            self.download.connect_timeout_ms = parse_ms(CONNECT_TIMEOUT_ENV_VAR, &connect)?;
        }
        if let Ok(read) = env::var(READ_TIMEOUT_ENV_VAR) {
            self.download.read_timeout_ms = parse_ms(READ_TIMEOUT_ENV_VAR, &read)?;
        }
        Ok(())
    }

    /// Validates settings, normalizing the public base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first violated constraint.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid(format!("bind is not a socket address: {}", self.server.bind)))?;

        let base_url = self.server.public_base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "public_base_url must start with http:// or https://, got {base_url:?}"
            )));
        }
        self.server.public_base_url = base_url;

        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".to_string()));
        }
        if !(MIN_CONNECT_TIMEOUT_MS..=MAX_CONNECT_TIMEOUT_MS)
            .contains(&self.download.connect_timeout_ms)
        {
            return Err(ConfigError::Invalid(format!(
                "connect_timeout_ms must be within [{MIN_CONNECT_TIMEOUT_MS}, {MAX_CONNECT_TIMEOUT_MS}]"
            )));
        }
        if !(MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS).contains(&self.download.read_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "read_timeout_ms must be within [{MIN_READ_TIMEOUT_MS}, {MAX_READ_TIMEOUT_MS}]"
            )));
        }
        Ok(())
    }

    /// Returns the effective template cache root.
    #[must_use]
    pub fn effective_cache_root(&self) -> PathBuf {
        self.cache
            .root
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join(DEFAULT_CACHE_SUBDIR))
    }

    /// Returns the download connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.download.connect_timeout_ms)
    }

    /// Returns the download read timeout.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.download.read_timeout_ms)
    }
}

/// Parses a millisecond environment value.
fn parse_ms(var: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(format!("{var} must be an integer, got {value:?}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests defaults validate and derive the cache root from the data dir.
    #[test]
    fn defaults_validate_and_derive_cache_root() {
        let mut config = FramepressConfig::default();
        config.validate().expect("defaults valid");
        assert_eq!(config.server.bind, "127.0.0.1:9002");
        assert_eq!(config.server.public_base_url, "http://localhost:9002");
        assert_eq!(config.effective_cache_root(), PathBuf::from("./data/_templates"));
        assert_eq!(config.connect_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.read_timeout(), Duration::from_millis(30_000));
    }

    /// Tests TOML values override defaults.
    #[test]
    fn toml_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("framepress.toml");
        std::fs::write(
            &path,
            concat!(
                "[server]\n",
                "bind = \"0.0.0.0:8080\"\n",
                "public_base_url = \"http://cdn.example/\"\n",
                "[storage]\n",
                "data_dir = \"/srv/framepress\"\n",
                "[cache]\n",
                "root = \"/var/cache/framepress\"\n",
                "[download]\n",
                "connect_timeout_ms = 1500\n",
            ),
        )
        .expect("write config");
        let config = FramepressConfig::load(Some(path.as_path())).expect("load");
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        // Trailing slash is normalized away.
        assert_eq!(config.server.public_base_url, "http://cdn.example");
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/framepress"));
        assert_eq!(config.effective_cache_root(), PathBuf::from("/var/cache/framepress"));
        assert_eq!(config.download.connect_timeout_ms, 1500);
        assert_eq!(config.download.read_timeout_ms, 30_000);
    }

    /// Tests an explicitly named missing file fails closed.
    #[test]
    fn missing_explicit_file_fails_closed() {
        let err = FramepressConfig::load(Some(Path::new("/nonexistent/framepress.toml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    /// Tests timeout bounds are enforced.
    #[test]
    fn timeout_bounds_are_enforced() {
        let mut config = FramepressConfig::default();
        config.download.connect_timeout_ms = 10;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = FramepressConfig::default();
        config.download.read_timeout_ms = MAX_READ_TIMEOUT_MS + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    /// Tests malformed bind addresses and base URLs are rejected.
    #[test]
    fn malformed_bind_and_base_url_are_rejected() {
        let mut config = FramepressConfig::default();
        config.server.bind = "not-an-address".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = FramepressConfig::default();
        config.server.public_base_url = "ftp://example".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
