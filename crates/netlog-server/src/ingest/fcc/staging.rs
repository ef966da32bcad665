// Intermediate durable store for extracted ULS files
//
// A continuation may run on a different worker with an empty scratch disk, so
// the extracted AM.dat / EN.dat are staged once per job under
// `{prefix}/{job_id}/{file}` and fetched back on demand.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::models::Phase;
use super::{FccError, Result};
use crate::storage::Storage;

/// Durable file store shared by every invocation of a job
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Copy a local file into the store, returning its size in bytes
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64>;

    /// Copy a stored file to `dest`, returning its size in bytes
    async fn fetch_file(&self, key: &str, dest: &Path) -> Result<u64>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Staging key of a phase file
pub fn staging_key(prefix: &str, job_id: &str, phase: Phase) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", job_id, phase.file_name())
    } else {
        format!("{}/{}/{}", prefix, job_id, phase.file_name())
    }
}

#[async_trait]
impl StagingStore for Storage {
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64> {
        self.upload_file(key, path)
            .await
            .map_err(|e| FccError::Staging(format!("{:#}", e)))
    }

    async fn fetch_file(&self, key: &str, dest: &Path) -> Result<u64> {
        self.download_to_file(key, dest)
            .await
            .map_err(|e| FccError::Staging(format!("{:#}", e)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Storage::delete(self, key)
            .await
            .map_err(|e| FccError::Staging(format!("{:#}", e)))
    }
}

/// Staging on a directory, for single-host deployments with a shared volume
#[derive(Debug, Clone)]
pub struct LocalStagingStore {
    root: PathBuf,
}

impl LocalStagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if key.is_empty() || escapes {
            return Err(FccError::Staging(format!("Invalid staging key: {:?}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StagingStore for LocalStagingStore {
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64> {
        let target = self.path_for(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size = tokio::fs::copy(path, &target).await?;
        debug!(key, size, "Staged file locally");
        Ok(size)
    }

    async fn fetch_file(&self, key: &str, dest: &Path) -> Result<u64> {
        let source = self.path_for(key)?;
        if !tokio::fs::try_exists(&source).await? {
            return Err(FccError::Staging(format!("Staged file not found: {}", key)));
        }

        Ok(tokio::fs::copy(&source, dest).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let target = self.path_for(key)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_key() {
        assert_eq!(
            staging_key("fcc-import/", "job-1", Phase::Amateur),
            "fcc-import/job-1/AM.dat"
        );
        assert_eq!(staging_key("", "job-1", Phase::Entity), "job-1/EN.dat");
    }

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let store = LocalStagingStore::new(root.path());

        let source = scratch.path().join("AM.dat");
        tokio::fs::write(&source, b"AM|1|2|3|W1AW\n").await.unwrap();

        let key = staging_key("fcc", "job-1", Phase::Amateur);
        assert_eq!(store.put_file(&key, &source).await.unwrap(), 14);

        let dest = scratch.path().join("fetched.dat");
        store.fetch_file(&key, &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"AM|1|2|3|W1AW\n");

        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(matches!(
            store.fetch_file(&key, &dest).await,
            Err(FccError::Staging(_))
        ));
    }

    #[test]
    fn test_local_store_rejects_escaping_keys() {
        let store = LocalStagingStore::new("/tmp/staging");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/abs/AM.dat").is_err());
        assert!(store.path_for("fcc/job/AM.dat").is_ok());
    }
}
