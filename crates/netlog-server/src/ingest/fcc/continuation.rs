// Continuation dispatch
//
// When an invocation exhausts its budget it hands a continuation event to a
// dispatcher and returns. Delivery must be reliable from the caller's side:
// a failed dispatch fails the invocation so the job lands in `error` rather
// than silently stalling.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{FccError, Result};
use crate::ingest::jobs::FccImportJob;

/// Fire-and-forget re-invocation of the import handler
#[async_trait]
pub trait ContinuationDispatcher: Send + Sync {
    async fn dispatch(&self, job: FccImportJob) -> Result<()>;
}

/// In-process dispatch onto the import worker's queue.
///
/// The queue is unbounded: the worker dispatches into its own queue while
/// processing, and a bounded send there could wait on itself.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<FccImportJob>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<FccImportJob>) -> Self {
        Self { tx }
    }

    /// A dispatcher and the receiving end to hand to an `ImportWorker`
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FccImportJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ContinuationDispatcher for ChannelDispatcher {
    async fn dispatch(&self, job: FccImportJob) -> Result<()> {
        let job_id = job.job_id.clone();
        self.tx
            .send(job)
            .map_err(|_| FccError::Dispatch(format!("Import worker is gone; job {} dropped", job_id)))?;

        debug!(job_id = %job_id, "Queued job on in-process worker");
        Ok(())
    }
}

/// Dispatch by POSTing the event to an import trigger endpoint
#[derive(Clone)]
pub struct HttpDispatcher {
    client: Client,
    url: String,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpDispatcher {
    pub fn new(url: impl Into<String>, max_retries: u32) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            url: url.into(),
            max_retries: max_retries.max(1),
            base_backoff: Duration::from_secs(1),
        })
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    async fn post_once(&self, job: &FccImportJob) -> Result<()> {
        let response = self.client.post(&self.url).json(job).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FccError::Dispatch(format!(
                "{} responded {}: {}",
                self.url, status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContinuationDispatcher for HttpDispatcher {
    async fn dispatch(&self, job: FccImportJob) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.post_once(&job).await {
                Ok(()) => {
                    info!(job_id = %job.job_id, url = %self.url, "Continuation dispatched");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Continuation dispatch attempt {}/{} failed: {}",
                        attempt, self.max_retries, e
                    );
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        tokio::time::sleep(self.base_backoff * 2u32.pow(attempt)).await;
                    }
                }
            }
        }

        Err(match last_error {
            Some(FccError::Dispatch(message)) => FccError::Dispatch(message),
            Some(other) => FccError::Dispatch(other.to_string()),
            None => FccError::Dispatch(format!("No dispatch attempt made to {}", self.url)),
        })
    }
}
