//! Remote batch service abstraction.
//!
//! The pipeline only needs four operations from the remote service: upload a
//! request file, register a batch for it, read the batch back, and download a
//! file's content. `OpenAiBatchClient` talks to an OpenAI-compatible API; tests
//! substitute in-memory implementations.

#[cfg(test)]
pub(crate) mod fake;
pub mod openai;

pub use openai::OpenAiBatchClient;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Endpoint registered for every batch
pub const BATCH_ENDPOINT: &str = "/v1/chat/completions";

/// Only completion window the service accepts
pub const COMPLETION_WINDOW: &str = "24h";

/// Description attached to every batch as metadata
pub const BATCH_DESCRIPTION: &str = "image description job";

/// File stored on the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// Lifecycle state of a remote batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Validating,
    InProgress,
    Finalizing,
    Completed,
    Failed,
    Expired,
    Cancelling,
    Cancelled,
    /// A value this client does not know about
    #[serde(other)]
    Unknown,
}

impl BatchStatus {
    /// No further transitions happen after a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed
                | BatchStatus::Failed
                | BatchStatus::Expired
                | BatchStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Validating => "validating",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Expired => "expired",
            BatchStatus::Cancelling => "cancelling",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counts reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Remote batch job as observed by this client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub status: BatchStatus,
    #[serde(default)]
    pub input_file_id: Option<String>,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
    #[serde(default)]
    pub request_counts: Option<RequestCounts>,
}

/// Operations the pipeline needs from the remote batch service
#[async_trait]
pub trait BatchService: Send + Sync {
    /// Upload a request-batch file for batch use
    async fn upload_batch_file(&self, path: &Path) -> Result<RemoteFile>;

    /// Register a batch job for an uploaded file
    async fn create_batch(&self, input_file_id: &str) -> Result<BatchJob>;

    /// Fetch the current state of a batch job
    async fn get_batch(&self, batch_id: &str) -> Result<BatchJob>;

    /// Download the raw content of a remote file
    async fn file_content(&self, file_id: &str) -> Result<Bytes>;
}
