//! S3 connection settings for the staging bucket
//!
//! Only read when `FCC_STAGING_BACKEND=s3`. Falls back to the standard
//! `AWS_*` credential variables when the `S3_*` ones are unset.

use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_BUCKET: &str = "netlog-staging";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint for S3-compatible stores; `None` targets AWS
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| env::var(key).ok())
        .filter(|value| !value.trim().is_empty())
}

impl StorageConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            endpoint: first_var(&["S3_ENDPOINT"]),
            region: first_var(&["S3_REGION", "AWS_REGION"]).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket: first_var(&["S3_BUCKET"]).unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            access_key: first_var(&["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]).unwrap_or_default(),
            secret_key: first_var(&["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]).unwrap_or_default(),
            path_style: first_var(&["S3_PATH_STYLE"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Local MinIO with its stock credentials
    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_REGION.to_string(),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.trim().is_empty() {
            anyhow::bail!("S3_BUCKET cannot be empty");
        }
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            anyhow::bail!("S3 staging needs S3_ACCESS_KEY and S3_SECRET_KEY (or AWS_* equivalents)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000", "fcc-staging");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.bucket, "fcc-staging");
        assert!(config.path_style);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        let config = StorageConfig {
            access_key: String::new(),
            ..StorageConfig::for_minio("http://localhost:9000", "fcc-staging")
        };
        assert!(config.validate().is_err());
    }
}
