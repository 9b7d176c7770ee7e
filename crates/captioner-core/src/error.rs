//! Error types for the captioning batch pipeline.

use std::path::PathBuf;

/// Errors raised by the builder, the remote client, the submitter and the retriever.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Batch API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Duplicate custom ids in batch {shard}: {}", .ids.join(", "))]
    DuplicateCustomIds { shard: usize, ids: Vec<String> },

    #[error("Batch index {index} is already taken, refusing to overwrite it for {}", .path.display())]
    IndexConflict { index: usize, path: PathBuf },

    #[error("Batch id record is empty: {}", .path.display())]
    EmptyBatchId { path: PathBuf },

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
