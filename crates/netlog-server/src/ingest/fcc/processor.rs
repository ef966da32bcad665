//! Checkpointed stream processing of one ULS phase file
//!
//! The processor pulls lines from an async reader one at a time, so a batch
//! flush is an ordinary `await` before the next line is requested and at most
//! one write is ever in flight.
//!
//! Per line:
//!
//! 1. Lines with ordinal `<= checkpoint.skip_lines` were handled by an earlier
//!    invocation and are discarded.
//! 2. Once at least one new line has been consumed, the invocation budget is
//!    checked before reading the next one. When it is exhausted the partial
//!    batch is flushed and a checkpoint pointing just past the last consumed
//!    line is returned as [`StreamOutcome::Continued`].
//! 3. Matching records accumulate until `batch_size`, then are deduplicated
//!    and handed to the [`BatchWriter`].
//!
//! `skip_lines` only ever advances after a successful flush, so resuming from
//! a checkpoint never replays a committed line and never skips an unwritten
//! one.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, instrument};

use super::dedup::dedup_records;
use super::models::JobCheckpoint;
use super::parser::{matches_tag, parse_line, UlsRecord};
use super::writer::BatchWriter;
use super::Result;

/// Wall-clock budget of one invocation
#[derive(Debug, Clone)]
pub struct InvocationBudget {
    started: Instant,
    limit: Duration,
    line_limit: Option<u64>,
}

impl InvocationBudget {
    /// Budget starting now
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            line_limit: None,
        }
    }

    /// Additionally stop a stream after this many new lines
    pub fn with_line_limit(mut self, line_limit: Option<u64>) -> Self {
        self.line_limit = line_limit;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the invocation must checkpoint now, given the number of lines
    /// the current stream consumed in this invocation
    pub fn exhausted(&self, lines_this_invocation: u64) -> bool {
        self.elapsed() >= self.limit
            || self
                .line_limit
                .is_some_and(|max| lines_this_invocation >= max)
    }
}

/// Snapshot handed to the progress sink while streaming
#[derive(Debug, Clone)]
pub struct StreamProgress {
    pub checkpoint: JobCheckpoint,
    pub bytes_read: u64,
    pub total_bytes: u64,
}

impl StreamProgress {
    /// Fraction of the file consumed, in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_read as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// Receiver of periodic progress while a phase streams.
///
/// Reporting is observational; implementations log their own failures.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: StreamProgress);
}

/// How a phase stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// End of file reached; the checkpoint carries the final counts
    Completed(JobCheckpoint),
    /// Budget exhausted; resume from this checkpoint in a new invocation
    Continued(JobCheckpoint),
}

impl StreamOutcome {
    pub fn checkpoint(&self) -> &JobCheckpoint {
        match self {
            StreamOutcome::Completed(cp) | StreamOutcome::Continued(cp) => cp,
        }
    }
}

/// Batched, checkpointed driver of parser, dedup and writer
#[derive(Debug, Clone)]
pub struct StreamProcessor {
    batch_size: usize,
    progress_interval: u64,
}

impl StreamProcessor {
    pub fn new(batch_size: usize, progress_interval: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            progress_interval,
        }
    }

    /// Stream `reader` into `writer`, resuming from `checkpoint`
    #[instrument(skip_all, fields(job_id = %checkpoint.job_id, phase = %R::PHASE))]
    pub async fn process<R, W, S>(
        &self,
        writer: &W,
        mut reader: S,
        total_bytes: u64,
        checkpoint: JobCheckpoint,
        budget: &InvocationBudget,
        sink: &dyn ProgressSink,
    ) -> Result<StreamOutcome>
    where
        R: UlsRecord,
        W: BatchWriter<R> + ?Sized,
        S: AsyncBufRead + Unpin + Send,
    {
        let resume_from = checkpoint.skip_lines;
        let mut cp = checkpoint;
        let mut consumed: u64 = 0;
        let mut bytes_read: u64 = 0;
        let mut batch: Vec<R> = Vec::with_capacity(self.batch_size);
        let mut buf: Vec<u8> = Vec::with_capacity(512);

        if resume_from > 0 {
            info!(skip_lines = resume_from, "Resuming phase stream");
        }

        loop {
            if consumed > resume_from && budget.exhausted(consumed - resume_from) {
                self.flush(writer, &mut batch, &mut cp).await?;
                cp.skip_lines = cp.skip_lines.max(consumed);

                info!(
                    skip_lines = cp.skip_lines,
                    record_count = cp.record_count,
                    processed_count = cp.processed_count,
                    elapsed_secs = budget.elapsed().as_secs(),
                    "Invocation budget exhausted, checkpointing"
                );
                return Ok(StreamOutcome::Continued(cp));
            }

            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).await?;
            if n == 0 {
                break;
            }
            consumed += 1;
            bytes_read += n as u64;

            if consumed <= resume_from {
                continue;
            }

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(['\r', '\n']);
            // Short and blank-callsign rows still count toward the total
            if matches_tag::<R>(line) {
                cp.record_count += 1;
                if let Some(record) = parse_line::<R>(line) {
                    batch.push(record);
                }
            }

            if batch.len() >= self.batch_size {
                let before = cp.processed_count;
                self.flush(writer, &mut batch, &mut cp).await?;
                cp.skip_lines = cp.skip_lines.max(consumed);

                if self.crossed_interval(before, cp.processed_count) {
                    sink.report(StreamProgress {
                        checkpoint: cp.clone(),
                        bytes_read,
                        total_bytes,
                    })
                    .await;
                }
            }
        }

        self.flush(writer, &mut batch, &mut cp).await?;
        cp.skip_lines = cp.skip_lines.max(consumed);

        info!(
            lines = consumed,
            record_count = cp.record_count,
            processed_count = cp.processed_count,
            "Phase stream completed"
        );
        Ok(StreamOutcome::Completed(cp))
    }

    async fn flush<R, W>(&self, writer: &W, batch: &mut Vec<R>, cp: &mut JobCheckpoint) -> Result<()>
    where
        R: UlsRecord,
        W: BatchWriter<R> + ?Sized,
    {
        if batch.is_empty() {
            return Ok(());
        }

        let pending = std::mem::replace(batch, Vec::with_capacity(self.batch_size));
        let parsed = pending.len();
        let deduped = dedup_records(pending);

        let outcome = writer.write_batch(&deduped).await?;
        cp.processed_count += outcome.written as u64;

        debug!(
            parsed,
            unique = deduped.len(),
            written = outcome.written,
            dropped = outcome.dropped,
            "Flushed batch"
        );
        Ok(())
    }

    fn crossed_interval(&self, before: u64, after: u64) -> bool {
        self.progress_interval > 0 && after / self.progress_interval > before / self.progress_interval
    }
}
