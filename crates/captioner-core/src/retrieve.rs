//! Batch retriever: waits for submitted batches to finish and downloads their output.
//!
//! Id records are processed one at a time, each polled until the remote batch
//! reaches a terminal status. Polling sleeps can be interrupted through a
//! `CancellationToken` and bounded by an optional timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{BatchJob, BatchService, BatchStatus};
use crate::config::{Settings, DEFAULT_POLL_INTERVAL_SECS};
use crate::submit::DEFAULT_ID_PREFIX;
use crate::{Error, Result};

/// Default file name prefix for downloaded results
pub const DEFAULT_OUTPUT_PREFIX: &str = "prev-batch_output_";

/// Default directory for downloaded results
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// How a single batch is polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two polls
    pub interval: Duration,
    /// Give up on a batch after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: None,
        }
    }
}

impl From<&Settings> for PollPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.poll_interval(),
            timeout: settings.poll_timeout(),
        }
    }
}

/// Options for a retriever run
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Prefix of the id-record files to read
    pub batch_prefix: String,
    /// Prefix of the result files written
    pub output_prefix: String,
    pub output_dir: PathBuf,
    pub poll: PollPolicy,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            batch_prefix: DEFAULT_ID_PREFIX.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            poll: PollPolicy::default(),
        }
    }
}

/// A batch id record found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRecord {
    /// File name with prefix and `.txt` stripped
    pub index: String,
    pub path: PathBuf,
}

/// How waiting on a batch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResult {
    Terminal(BatchJob),
    TimedOut { last_status: BatchStatus },
}

/// What happened to one id record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Output downloaded and written
    Retrieved { path: PathBuf, bytes: usize },
    /// Batch ended in a non-success terminal status
    NotCompleted { status: BatchStatus },
    /// Batch completed without an output file
    MissingOutput,
    /// Poll timeout elapsed before a terminal status
    TimedOut { last_status: BatchStatus },
}

#[derive(Debug, Clone)]
pub struct RetrievedBatch {
    pub index: String,
    pub batch_id: String,
    pub outcome: RetrievalOutcome,
}

impl RetrievedBatch {
    /// One-line console summary
    pub fn summary(&self) -> String {
        match &self.outcome {
            RetrievalOutcome::Retrieved { .. } => format!(
                "Batch {} processing completed and results retrieved.",
                self.index
            ),
            RetrievalOutcome::NotCompleted { status } => format!(
                "Batch {} processing did not complete successfully. Status: {}",
                self.index, status
            ),
            RetrievalOutcome::MissingOutput => format!(
                "Batch {} completed but reported no output file.",
                self.index
            ),
            RetrievalOutcome::TimedOut { last_status } => format!(
                "Batch {} still {} when the poll timeout elapsed.",
                self.index, last_status
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetrieveReport {
    pub batches: Vec<RetrievedBatch>,
}

/// Find id records in `batch_dir`, numeric indices first in ascending order.
pub fn list_id_records(batch_dir: &Path, prefix: &str) -> Result<Vec<IdRecord>> {
    let mut records = Vec::new();
    for entry in std::fs::read_dir(batch_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(index) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(".txt"))
        else {
            continue;
        };
        if entry.path().is_file() {
            records.push(IdRecord {
                index: index.to_string(),
                path: entry.path(),
            });
        }
    }

    records.sort_by_cached_key(|r| {
        let numeric = r.index.parse::<u64>().ok();
        (numeric.is_none(), numeric, r.index.clone())
    });
    Ok(records)
}

/// Read the batch id stored in an id record
pub fn read_batch_id(path: &Path) -> Result<String> {
    let id = std::fs::read_to_string(path)?.trim().to_string();
    if id.is_empty() {
        return Err(Error::EmptyBatchId {
            path: path.to_path_buf(),
        });
    }
    Ok(id)
}

/// Poll `batch_id` until it reaches a terminal status, the policy timeout
/// elapses, or `cancel` fires.
///
/// A zero interval is rejected before the first poll.
pub async fn wait_for_terminal<S>(
    service: &S,
    batch_id: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<WaitResult>
where
    S: BatchService + ?Sized,
{
    if policy.interval.is_zero() {
        return Err(Error::config("poll interval must be greater than zero"));
    }

    let deadline = policy.timeout.map(|t| Instant::now() + t);

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            job = service.get_batch(batch_id) => job?,
        };

        if job.status.is_terminal() {
            return Ok(WaitResult::Terminal(job));
        }

        let sleep_for = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(WaitResult::TimedOut {
                        last_status: job.status,
                    });
                }
                policy.interval.min(deadline - now)
            }
            None => policy.interval,
        };

        tracing::debug!(
            batch_id,
            status = %job.status,
            "Batch not finished, checking again in {:?}",
            sleep_for
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(sleep_for) => {}
        }
    }
}

/// Wait for every recorded batch and download the output of completed ones.
///
/// Non-success statuses and timeouts are reported and skipped. I/O errors,
/// remote errors and cancellation abort the run.
pub async fn retrieve_results<S>(
    service: &S,
    batch_dir: &Path,
    options: &RetrieveOptions,
    cancel: &CancellationToken,
) -> Result<RetrieveReport>
where
    S: BatchService + ?Sized,
{
    let records = list_id_records(batch_dir, &options.batch_prefix)?;
    let mut report = RetrieveReport::default();

    if records.is_empty() {
        tracing::info!("No batch ID files found in {:?}", batch_dir);
        return Ok(report);
    }

    for record in records {
        let batch_id = read_batch_id(&record.path)?;
        tracing::info!(index = %record.index, batch_id = %batch_id, "Waiting for batch");

        let outcome = match wait_for_terminal(service, &batch_id, options.poll, cancel).await? {
            WaitResult::Terminal(job) if job.status == BatchStatus::Completed => {
                match job.output_file_id {
                    Some(file_id) => {
                        let content = service.file_content(&file_id).await?;
                        let path = options
                            .output_dir
                            .join(format!("{}{}.jsonl", options.output_prefix, record.index));
                        tokio::fs::create_dir_all(&options.output_dir).await?;
                        tokio::fs::write(&path, &content).await?;
                        RetrievalOutcome::Retrieved {
                            path,
                            bytes: content.len(),
                        }
                    }
                    None => RetrievalOutcome::MissingOutput,
                }
            }
            WaitResult::Terminal(job) => RetrievalOutcome::NotCompleted { status: job.status },
            WaitResult::TimedOut { last_status } => RetrievalOutcome::TimedOut { last_status },
        };

        let batch = RetrievedBatch {
            index: record.index,
            batch_id,
            outcome,
        };
        tracing::debug!(index = %batch.index, outcome = ?batch.outcome, "Batch done");
        report.batches.push(batch);
    }

    Ok(report)
}
