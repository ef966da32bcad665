//! FCC import configuration
//!
//! Loaded from `FCC_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::fcc::writer::MAX_BATCH_SIZE;

const DEFAULT_SOURCE_URL: &str = "https://data.fcc.gov/download/pub/uls/complete/l_amat.zip";
const DEFAULT_BATCH_SIZE: usize = 100;
/// 12 minutes, short of a 15 minute host ceiling to leave room for the final
/// flush and checkpoint write
const DEFAULT_TIME_BUDGET_SECS: u64 = 720;
const DEFAULT_PROGRESS_INTERVAL: u64 = 5000;
const DEFAULT_CONFLICT_WINDOW_SECS: u64 = 3600;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const DEFAULT_DOWNLOAD_RETRIES: u32 = 3;
const DEFAULT_DISPATCH_RETRIES: u32 = 3;
const DEFAULT_STAGING_PREFIX: &str = "fcc-import";

/// Where extracted files are staged between invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingBackend {
    S3,
    Local,
}

impl std::str::FromStr for StagingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(StagingBackend::S3),
            "local" | "fs" => Ok(StagingBackend::Local),
            other => anyhow::bail!("FCC_STAGING_BACKEND must be 's3' or 'local', got {:?}", other),
        }
    }
}

/// FCC ULS import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FccImportConfig {
    /// Run the in-process import worker (default: true)
    pub enabled: bool,
    pub source_url: String,
    /// Rows per upsert statement (default: 100)
    pub batch_size: usize,
    /// Wall-clock budget of one invocation (default: 720)
    pub time_budget_secs: u64,
    /// Optional cap on new source lines per phase stream per invocation
    pub max_lines_per_invocation: Option<u64>,
    /// Processed records between progress writes (default: 5000)
    pub progress_interval: u64,
    /// Recency window of the concurrent-job guard (default: 3600)
    pub conflict_window_secs: u64,
    pub download_timeout_secs: u64,
    pub download_retries: u32,
    /// Local scratch space for the archive and extracted files
    pub scratch_dir: PathBuf,
    pub staging_backend: StagingBackend,
    /// Root directory of the local staging backend
    pub staging_dir: PathBuf,
    /// Key prefix inside the staging store
    pub staging_prefix: String,
    /// When set, continuations are POSTed here instead of queued in-process
    pub continuation_url: Option<String>,
    pub dispatch_retries: u32,
}

impl Default for FccImportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            time_budget_secs: DEFAULT_TIME_BUDGET_SECS,
            max_lines_per_invocation: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            conflict_window_secs: DEFAULT_CONFLICT_WINDOW_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            download_retries: DEFAULT_DOWNLOAD_RETRIES,
            scratch_dir: std::env::temp_dir().join("netlog-fcc"),
            staging_backend: StagingBackend::S3,
            staging_dir: PathBuf::from("./data/fcc-staging"),
            staging_prefix: DEFAULT_STAGING_PREFIX.to_string(),
            continuation_url: None,
            dispatch_retries: DEFAULT_DISPATCH_RETRIES,
        }
    }
}

impl FccImportConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            enabled: std::env::var("FCC_IMPORT_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enabled),
            source_url: std::env::var("FCC_SOURCE_URL").unwrap_or(defaults.source_url),
            batch_size: std::env::var("FCC_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            time_budget_secs: std::env::var("FCC_TIME_BUDGET_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.time_budget_secs),
            max_lines_per_invocation: std::env::var("FCC_MAX_LINES_PER_INVOCATION")
                .ok()
                .and_then(|v| v.parse().ok()),
            progress_interval: std::env::var("FCC_PROGRESS_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.progress_interval),
            conflict_window_secs: std::env::var("FCC_CONFLICT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.conflict_window_secs),
            download_timeout_secs: std::env::var("FCC_DOWNLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.download_timeout_secs),
            download_retries: std::env::var("FCC_DOWNLOAD_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.download_retries),
            scratch_dir: std::env::var("FCC_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            staging_backend: match std::env::var("FCC_STAGING_BACKEND") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.staging_backend,
            },
            staging_dir: std::env::var("FCC_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            staging_prefix: std::env::var("FCC_STAGING_PREFIX").unwrap_or(defaults.staging_prefix),
            continuation_url: std::env::var("FCC_CONTINUATION_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            dispatch_retries: std::env::var("FCC_DISPATCH_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.dispatch_retries),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.source_url.trim().is_empty() {
            anyhow::bail!("FCC_SOURCE_URL cannot be empty");
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!("FCC_BATCH_SIZE must be between 1 and {}", MAX_BATCH_SIZE);
        }
        if self.time_budget_secs == 0 {
            anyhow::bail!("FCC_TIME_BUDGET_SECS must be greater than 0");
        }
        if self.max_lines_per_invocation == Some(0) {
            anyhow::bail!("FCC_MAX_LINES_PER_INVOCATION must be greater than 0");
        }
        if self.download_timeout_secs == 0 {
            anyhow::bail!("FCC_DOWNLOAD_TIMEOUT_SECS must be greater than 0");
        }
        if let Some(ref url) = self.continuation_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("FCC_CONTINUATION_URL must be an http(s) URL");
            }
        }
        Ok(())
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    pub fn conflict_window(&self) -> Duration {
        Duration::from_secs(self.conflict_window_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_are_valid() {
        let config = FccImportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.time_budget(), Duration::from_secs(720));
        assert_eq!(config.conflict_window(), Duration::from_secs(3600));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = FccImportConfig {
            batch_size: 0,
            ..FccImportConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FccImportConfig {
            batch_size: MAX_BATCH_SIZE + 1,
            ..FccImportConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FccImportConfig {
            continuation_url: Some("ftp://example.com".to_string()),
            ..FccImportConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("FCC_BATCH_SIZE", "250");
        std::env::set_var("FCC_STAGING_BACKEND", "local");
        std::env::set_var("FCC_MAX_LINES_PER_INVOCATION", "1000");

        let config = FccImportConfig::from_env().unwrap();

        std::env::remove_var("FCC_BATCH_SIZE");
        std::env::remove_var("FCC_STAGING_BACKEND");
        std::env::remove_var("FCC_MAX_LINES_PER_INVOCATION");

        assert_eq!(config.batch_size, 250);
        assert_eq!(config.staging_backend, StagingBackend::Local);
        assert_eq!(config.max_lines_per_invocation, Some(1000));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_backend() {
        std::env::set_var("FCC_STAGING_BACKEND", "gcs");
        let result = FccImportConfig::from_env();
        std::env::remove_var("FCC_STAGING_BACKEND");

        assert!(result.is_err());
    }
}
