use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use captioner_core::requests::DEFAULT_REQUEST_PREFIX;
use captioner_core::retrieve::{DEFAULT_OUTPUT_DIR, DEFAULT_OUTPUT_PREFIX};
use captioner_core::submit::DEFAULT_ID_PREFIX;

#[derive(Parser, Debug)]
#[command(name = "captioner")]
#[command(about = "Caption images through the OpenAI batch API")]
pub struct Cli {
    /// Settings file (defaults to ~/.config/captioner/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// API root of an OpenAI-compatible service
    #[arg(long = "api_base", global = true)]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write request-batch JSONL files for every image in a directory
    Build(BuildArgs),
    /// Upload request-batch files and create one batch per file
    Submit(SubmitArgs),
    /// Wait for submitted batches and download their results
    Retrieve(RetrieveArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Directory containing images
    #[arg(long = "image_directory")]
    pub image_directory: PathBuf,

    /// Number of images per JSONL file
    #[arg(
        long = "per_jsonl",
        default_value_t = 120,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub per_jsonl: usize,

    /// Prefix for output JSONL files
    #[arg(long, default_value = DEFAULT_REQUEST_PREFIX)]
    pub prefix: String,

    /// Directory the JSONL files are written to
    #[arg(long = "output_dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Abort instead of warning when two images share a custom id
    #[arg(long = "fail_on_duplicate")]
    pub fail_on_duplicate: bool,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// OpenAI API key
    #[arg(long = "api_key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory containing input JSONL files
    #[arg(long = "input_dir")]
    pub input_dir: PathBuf,

    /// Directory to save batch IDs
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,

    /// Prefix for input JSONL files
    #[arg(long, default_value = DEFAULT_REQUEST_PREFIX)]
    pub prefix: String,

    /// Prefix for output batch ID files
    #[arg(long = "output_prefix", default_value = DEFAULT_ID_PREFIX)]
    pub output_prefix: String,
}

#[derive(Args, Debug)]
pub struct RetrieveArgs {
    /// OpenAI API key
    #[arg(long = "api_key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory containing batch ID files
    #[arg(long = "batch_dir")]
    pub batch_dir: PathBuf,

    /// Prefix for batch ID files
    #[arg(long = "batch_prefix", default_value = DEFAULT_ID_PREFIX)]
    pub batch_prefix: String,

    /// Prefix for output files
    #[arg(long = "output_prefix", default_value = DEFAULT_OUTPUT_PREFIX)]
    pub output_prefix: String,

    /// Directory to save output files
    #[arg(long = "output_dir", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Seconds between status checks (overrides settings)
    #[arg(long = "poll_interval", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Give up on a batch after this many seconds (overrides settings)
    #[arg(long)]
    pub timeout: Option<u64>,
}
