//! Batch submitter: uploads request-batch files and records the created batch ids.
//!
//! Each request file `…batch_requests_{n}.jsonl` yields one id record
//! `{output_prefix}{n}.txt`, so the index in the id record always matches the
//! shard index in the request file name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::client::{BatchService, BatchStatus};
use crate::requests::DEFAULT_REQUEST_PREFIX;
use crate::{Error, Result};

/// Default file name prefix for batch id records
pub const DEFAULT_ID_PREFIX: &str = "0527-batch";

/// Options for a submitter run
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Prefix of the request-batch files to submit
    pub prefix: String,
    /// Prefix of the id-record files written
    pub output_prefix: String,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_REQUEST_PREFIX.to_string(),
            output_prefix: DEFAULT_ID_PREFIX.to_string(),
        }
    }
}

/// A request-batch file paired with its shard index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFile {
    pub index: usize,
    pub path: PathBuf,
}

/// A batch created for one request file
#[derive(Debug, Clone)]
pub struct SubmittedBatch {
    pub index: usize,
    pub request_file: PathBuf,
    pub input_file_id: String,
    pub batch_id: String,
    pub status: BatchStatus,
    pub id_record: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitReport {
    pub batches: Vec<SubmittedBatch>,
}

/// Parse the trailing shard index of a request file name
/// (`request052701-batch_requests_12.jsonl` -> 12).
pub fn parse_shard_index(file_name: &str) -> Option<usize> {
    let stem = file_name.strip_suffix(".jsonl").unwrap_or(file_name);
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[digits_start..].parse().ok()
}

/// Path of the id record for shard `index`
pub fn id_record_path(output_dir: &Path, output_prefix: &str, index: usize) -> PathBuf {
    output_dir.join(format!("{}{}.txt", output_prefix, index))
}

/// Find request-batch files in `input_dir` whose names start with `prefix`,
/// ordered by shard index.
///
/// Files without a parseable index fall back to their position in name order.
/// Two files resolving to the same index is an error.
pub fn list_request_files(input_dir: &Path, prefix: &str) -> Result<Vec<RequestFile>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name.ends_with(".jsonl") && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();

    let mut by_index: BTreeMap<usize, PathBuf> = BTreeMap::new();
    let mut unindexed = Vec::new();

    for (position, name) in names.iter().enumerate() {
        let path = input_dir.join(name);
        match parse_shard_index(&name[prefix.len()..]) {
            Some(index) => {
                if by_index.contains_key(&index) {
                    return Err(Error::IndexConflict { index, path });
                }
                by_index.insert(index, path);
            }
            None => unindexed.push((position, path)),
        }
    }

    for (position, path) in unindexed {
        tracing::warn!(
            "No shard index in {:?}, using enumeration position {}",
            path,
            position
        );
        if by_index.contains_key(&position) {
            return Err(Error::IndexConflict {
                index: position,
                path,
            });
        }
        by_index.insert(position, path);
    }

    Ok(by_index
        .into_iter()
        .map(|(index, path)| RequestFile { index, path })
        .collect())
}

/// Upload every matching request file, create a batch for it and save the
/// batch id. Files are processed one at a time; the first error aborts the run.
pub async fn submit_request_files<S>(
    service: &S,
    input_dir: &Path,
    output_dir: &Path,
    options: &SubmitOptions,
) -> Result<SubmitReport>
where
    S: BatchService + ?Sized,
{
    let files = list_request_files(input_dir, &options.prefix)?;
    tracing::info!("Found {} request files in {:?}", files.len(), input_dir);

    let mut report = SubmitReport::default();
    if files.is_empty() {
        return Ok(report);
    }

    tokio::fs::create_dir_all(output_dir).await?;

    for file in files {
        let uploaded = service.upload_batch_file(&file.path).await?;
        let batch = service.create_batch(&uploaded.id).await?;

        tracing::debug!(
            index = file.index,
            batch_id = %batch.id,
            status = %batch.status,
            "Created batch for {:?}",
            file.path
        );

        let id_record = id_record_path(output_dir, &options.output_prefix, file.index);
        tokio::fs::write(&id_record, batch.id.as_bytes()).await?;
        tracing::debug!("Wrote {:?}", id_record);

        report.batches.push(SubmittedBatch {
            index: file.index,
            request_file: file.path,
            input_file_id: uploaded.id,
            batch_id: batch.id,
            status: batch.status,
            id_record,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeBatchService;
    use crate::requests::shard_file_name;

    fn write_request_files(dir: &Path, indices: &[usize]) {
        for i in indices {
            std::fs::write(
                dir.join(shard_file_name(DEFAULT_REQUEST_PREFIX, *i)),
                format!("{{\"custom_id\":\"request-{}.jpg\"}}\n", i),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_parse_shard_index() {
        assert_eq!(parse_shard_index("batch_requests_0.jsonl"), Some(0));
        assert_eq!(parse_shard_index("batch_requests_12.jsonl"), Some(12));
        assert_eq!(parse_shard_index("extra.jsonl"), None);
        assert_eq!(parse_shard_index(".jsonl"), None);
    }

    #[test]
    fn test_list_orders_by_index_not_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        // Name order would be 0, 10, 2
        write_request_files(temp_dir.path(), &[10, 2, 0]);
        std::fs::write(temp_dir.path().join("other-batch_requests_1.jsonl"), "").unwrap();
        std::fs::write(temp_dir.path().join("request052701-notes.txt"), "").unwrap();

        let files = list_request_files(temp_dir.path(), DEFAULT_REQUEST_PREFIX).unwrap();

        let indices: Vec<usize> = files.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2, 10]);
        assert!(files[2]
            .path
            .ends_with("request052701-batch_requests_10.jsonl"));
    }

    #[test]
    fn test_list_unindexed_falls_back_to_position() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("request052701-alpha.jsonl"), "").unwrap();
        std::fs::write(temp_dir.path().join("request052701-beta.jsonl"), "").unwrap();

        let files = list_request_files(temp_dir.path(), DEFAULT_REQUEST_PREFIX).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].index, 0);
        assert!(files[0].path.ends_with("request052701-alpha.jsonl"));
        assert_eq!(files[1].index, 1);
    }

    #[test]
    fn test_list_conflicting_index_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        // "alpha" sorts first, falls back to position 0, already taken by shard 0
        std::fs::write(temp_dir.path().join("request052701-alpha.jsonl"), "").unwrap();
        write_request_files(temp_dir.path(), &[0]);

        let err = list_request_files(temp_dir.path(), DEFAULT_REQUEST_PREFIX).unwrap_err();
        assert!(matches!(err, Error::IndexConflict { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_submit_writes_id_records_by_shard_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input_dir = temp_dir.path().join("requests");
        let output_dir = temp_dir.path().join("ids");
        std::fs::create_dir_all(&input_dir).unwrap();
        write_request_files(&input_dir, &[3, 1]);

        let service = FakeBatchService::new();
        let options = SubmitOptions::default();
        let report = submit_request_files(&service, &input_dir, &output_dir, &options)
            .await
            .unwrap();

        assert_eq!(report.batches.len(), 2);
        assert_eq!(service.uploads().len(), 2);

        // Shard 1 was uploaded first and got file-0
        let first = &report.batches[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.batch_id, "batch-file-0");
        assert_eq!(first.status, BatchStatus::Validating);
        assert_eq!(first.id_record, output_dir.join("0527-batch1.txt"));
        assert_eq!(
            std::fs::read_to_string(output_dir.join("0527-batch1.txt")).unwrap(),
            "batch-file-0"
        );
        assert_eq!(
            std::fs::read_to_string(output_dir.join("0527-batch3.txt")).unwrap(),
            "batch-file-1"
        );

        let uploads = service.uploads();
        let (uploaded_path, uploaded) = &uploads[1];
        assert!(uploaded_path.ends_with("request052701-batch_requests_3.jsonl"));
        assert_eq!(uploaded, b"{\"custom_id\":\"request-3.jpg\"}\n");
    }

    #[tokio::test]
    async fn test_submit_aborts_on_first_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_request_files(temp_dir.path(), &[0, 1, 2]);
        let output_dir = temp_dir.path().join("ids");

        let service = FakeBatchService::new();
        service.fail_create_at(1);

        let options = SubmitOptions::default();
        let err = submit_request_files(&service, temp_dir.path(), &output_dir, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status: 500, .. }));
        assert!(output_dir.join("0527-batch0.txt").exists());
        assert!(!output_dir.join("0527-batch1.txt").exists());
        assert!(!output_dir.join("0527-batch2.txt").exists());
        assert_eq!(service.created().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_no_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_dir = temp_dir.path().join("ids");

        let service = FakeBatchService::new();
        let options = SubmitOptions::default();
        let report = submit_request_files(&service, temp_dir.path(), &output_dir, &options)
            .await
            .unwrap();

        assert!(report.batches.is_empty());
        assert!(!output_dir.exists());
    }
}
