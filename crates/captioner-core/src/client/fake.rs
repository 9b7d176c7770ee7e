//! In-memory batch service for tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{BatchJob, BatchService, BatchStatus, RemoteFile};
use crate::{Error, Result};

#[derive(Default)]
struct State {
    uploads: Vec<(PathBuf, Vec<u8>)>,
    created: Vec<String>,
    /// Statuses each batch reports, one per poll; the last one repeats
    scripts: HashMap<String, VecDeque<BatchJob>>,
    files: HashMap<String, Bytes>,
    polls: HashMap<String, usize>,
    fail_create_at: Option<usize>,
}

#[derive(Default)]
pub struct FakeBatchService {
    state: Mutex<State>,
}

impl FakeBatchService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(id: &str, status: BatchStatus, output_file_id: Option<&str>) -> BatchJob {
        BatchJob {
            id: id.to_string(),
            status,
            input_file_id: None,
            output_file_id: output_file_id.map(str::to_string),
            error_file_id: None,
            request_counts: None,
        }
    }

    /// Script the statuses `batch_id` reports on successive polls
    pub fn script(&self, batch_id: &str, jobs: Vec<BatchJob>) {
        let mut state = self.state.lock().unwrap();
        state.scripts.insert(batch_id.to_string(), jobs.into());
    }

    pub fn add_file(&self, file_id: &str, content: impl Into<Bytes>) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(file_id.to_string(), content.into());
    }

    /// Make the n-th (0-based) `create_batch` call fail
    pub fn fail_create_at(&self, n: usize) {
        self.state.lock().unwrap().fail_create_at = Some(n);
    }

    pub fn uploads(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn polls(&self, batch_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .polls
            .get(batch_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl BatchService for FakeBatchService {
    async fn upload_batch_file(&self, path: &Path) -> Result<RemoteFile> {
        let contents = std::fs::read(path)?;
        let mut state = self.state.lock().unwrap();
        state.uploads.push((path.to_path_buf(), contents));
        Ok(RemoteFile {
            id: format!("file-{}", state.uploads.len() - 1),
            filename: None,
            bytes: None,
        })
    }

    async fn create_batch(&self, input_file_id: &str) -> Result<BatchJob> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create_at == Some(state.created.len()) {
            return Err(Error::Api {
                status: 500,
                message: "batch creation failed".to_string(),
            });
        }
        let id = format!("batch-{}", input_file_id);
        state.created.push(id.clone());
        Ok(BatchJob {
            input_file_id: Some(input_file_id.to_string()),
            ..Self::job(&id, BatchStatus::Validating, None)
        })
    }

    async fn get_batch(&self, batch_id: &str) -> Result<BatchJob> {
        let mut state = self.state.lock().unwrap();
        *state.polls.entry(batch_id.to_string()).or_default() += 1;

        let script = state.scripts.get_mut(batch_id).ok_or_else(|| Error::Api {
            status: 404,
            message: format!("No batch found with id '{}'.", batch_id),
        })?;
        let job = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        job.ok_or_else(|| Error::Api {
            status: 500,
            message: "empty script".to_string(),
        })
    }

    async fn file_content(&self, file_id: &str) -> Result<Bytes> {
        let state = self.state.lock().unwrap();
        state.files.get(file_id).cloned().ok_or_else(|| Error::Api {
            status: 404,
            message: format!("No file found with id '{}'.", file_id),
        })
    }
}
