//! Captioner Core - batch image captioning against an OpenAI-compatible batch API
//!
//! The pipeline has three independent stages that communicate only through
//! files on disk:
//! - Request builder: images -> `{prefix}batch_requests_{i}.jsonl`
//! - Submitter: request files -> remote batches -> `{output_prefix}{i}.txt`
//! - Retriever: id records -> polled batches -> `{output_prefix}{i}.jsonl`

pub mod client;
pub mod config;
pub mod error;
pub mod requests;
pub mod retrieve;
pub mod submit;

pub use client::{BatchJob, BatchService, BatchStatus, OpenAiBatchClient, RemoteFile};
pub use config::{Config, DuplicatePolicy, Settings};
pub use error::{Error, Result};
pub use requests::{build_request_batches, BuildOptions, BuildReport};
pub use retrieve::{retrieve_results, PollPolicy, RetrieveOptions, RetrieveReport};
pub use submit::{submit_request_files, SubmitOptions, SubmitReport};
