// ULS archive downloader
//
// Streams the archive to scratch disk chunk by chunk; the full l_amat.zip is
// never held in memory.

use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::{FccError, Result};

/// HTTP downloader for the ULS archive
#[derive(Clone)]
pub struct ArchiveDownloader {
    client: Client,
    max_retries: u32,
    base_backoff: Duration,
}

impl ArchiveDownloader {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("netlog/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_retries: max_retries.max(1),
            base_backoff: Duration::from_secs(1),
        })
    }

    /// Override the backoff unit (delay before retry n is `base * 2^n`)
    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Download `url` to `dest` with retry, returning the byte count
    #[instrument(skip(self))]
    pub async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.download_once(url, dest).await {
                Ok(size) => return Ok(size),
                Err(e) => {
                    warn!("Download attempt {}/{} failed: {}", attempt, self.max_retries, e);
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        // Exponential backoff: base * 2^attempt
                        let backoff = self.base_backoff * 2u32.pow(attempt);
                        info!("Retrying in {:?}...", backoff);
                        tokio::time::sleep(backoff).await;
                    }
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FccError::Download(format!("Download of {} failed with no attempts made", url))
        }))
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FccError::Download(format!(
                "HTTP error {} fetching {}",
                response.status(),
                url
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(FccError::Download(format!("Empty response body from {}", url)));
        }

        debug!(bytes = written, dest = %dest.display(), "Archive downloaded");
        Ok(written)
    }
}
