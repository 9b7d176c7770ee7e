//! Request builder: turns a directory of images into request-batch files.
//!
//! ```text
//! image_directory ──scan──► [ImageItem] ──shard(N)──► [[ImageItem]]
//!                                                         │
//!                            {prefix}batch_requests_{i}.jsonl  ◄── one CaptionRequest per line
//! ```

mod scan;
mod types;

pub use scan::{scan_images, ScanSummary};
pub use types::{
    CaptionRequest, ChatCompletionBody, ChatMessage, ChatRole, ContentPart, ImageItem, ImageUrl,
    MessageContent, RequestTemplate, CHAT_COMPLETIONS_URL, IMAGE_EXTENSIONS,
};

use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::Engine;

use crate::config::{DuplicatePolicy, Settings, DEFAULT_PER_SHARD};
use crate::{Error, Result};

/// Default file name prefix for request-batch files
pub const DEFAULT_REQUEST_PREFIX: &str = "request052701-";

/// Options for a builder run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum images per request-batch file
    pub per_shard: usize,
    pub prefix: String,
    /// Directory the request-batch files are written to
    pub output_dir: PathBuf,
    pub template: RequestTemplate,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            per_shard: DEFAULT_PER_SHARD,
            prefix: DEFAULT_REQUEST_PREFIX.to_string(),
            output_dir: PathBuf::from("."),
            template: RequestTemplate::default(),
            duplicate_policy: DuplicatePolicy::Warn,
        }
    }
}

impl BuildOptions {
    /// Take the request template and duplicate policy from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            template: RequestTemplate::from(settings),
            duplicate_policy: settings.duplicate_policy,
            ..Default::default()
        }
    }
}

/// A request-batch file written by the builder
#[derive(Debug, Clone)]
pub struct ShardFile {
    pub index: usize,
    pub path: PathBuf,
    pub request_count: usize,
}

/// Custom ids that were already seen when a shard was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIds {
    pub shard: usize,
    pub ids: Vec<String>,
}

/// Outcome of a builder run
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub total_files: usize,
    pub total_images: usize,
    pub shards: Vec<ShardFile>,
    pub duplicates: Vec<DuplicateIds>,
}

/// Running set of custom ids emitted during one builder run.
#[derive(Debug, Default)]
pub struct CustomIdRegistry {
    seen: HashSet<String>,
}

impl CustomIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record ids, returning every id that was already present.
    ///
    /// All ids end up in the registry whether or not they collided.
    pub fn record<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut duplicates = Vec::new();
        for id in ids {
            if !self.seen.insert(id.to_string()) {
                duplicates.push(id.to_string());
            }
        }
        duplicates
    }
}

/// File name of the request-batch file for shard `index`
pub fn shard_file_name(prefix: &str, index: usize) -> String {
    format!("{}batch_requests_{}.jsonl", prefix, index)
}

/// Split images into contiguous shards of at most `per_shard` items.
pub fn shard(images: &[ImageItem], per_shard: usize) -> Result<Vec<&[ImageItem]>> {
    if per_shard == 0 {
        return Err(Error::config("images per request file must be at least 1"));
    }
    Ok(images.chunks(per_shard).collect())
}

/// Read an image and return its content as standard base64
pub fn encode_image(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Build one caption request per image, in order.
pub fn prepare_requests(
    images: &[ImageItem],
    template: &RequestTemplate,
) -> Result<Vec<CaptionRequest>> {
    images
        .iter()
        .map(|image| {
            let data = encode_image(&image.path)?;
            Ok(template.request_for(image, &data))
        })
        .collect()
}

/// Write requests as newline-delimited JSON
pub fn write_request_file(path: &Path, requests: &[CaptionRequest]) -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    for request in requests {
        serde_json::to_writer(&mut writer, request)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Scan `image_dir`, shard the images and write one request-batch file per shard.
pub fn build_request_batches(image_dir: &Path, options: &BuildOptions) -> Result<BuildReport> {
    let scan = scan_images(image_dir)?;
    let shards = shard(&scan.images, options.per_shard)?;

    tracing::info!(
        total_files = scan.total_files,
        total_images = scan.images.len(),
        shard_count = shards.len(),
        "Scanned image directory {:?}",
        image_dir
    );

    let mut report = BuildReport {
        total_files: scan.total_files,
        total_images: scan.images.len(),
        ..Default::default()
    };

    if !shards.is_empty() {
        std::fs::create_dir_all(&options.output_dir)?;
    }

    let mut registry = CustomIdRegistry::new();

    for (index, images) in shards.into_iter().enumerate() {
        let ids: Vec<String> = images.iter().map(ImageItem::custom_id).collect();
        let duplicates = registry.record(ids.iter().map(String::as_str));

        if !duplicates.is_empty() {
            match options.duplicate_policy {
                DuplicatePolicy::Warn => {
                    tracing::debug!(shard = index, ids = ?duplicates, "Duplicate custom ids");
                    report.duplicates.push(DuplicateIds {
                        shard: index,
                        ids: duplicates,
                    });
                }
                DuplicatePolicy::Fail => {
                    return Err(Error::DuplicateCustomIds {
                        shard: index,
                        ids: duplicates,
                    });
                }
            }
        }

        let requests = prepare_requests(images, &options.template)?;
        let path = options
            .output_dir
            .join(shard_file_name(&options.prefix, index));
        write_request_file(&path, &requests)?;

        tracing::debug!(shard = index, requests = requests.len(), "Wrote {:?}", path);

        report.shards.push(ShardFile {
            index,
            path,
            request_count: requests.len(),
        });
    }

    Ok(report)
}
