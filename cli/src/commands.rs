//! Subcommand handlers: translate CLI arguments into core pipeline calls and
//! print the console report for each stage.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use captioner_core::{
    build_request_batches, retrieve_results, submit_request_files, BuildOptions, BuildReport,
    DuplicatePolicy, OpenAiBatchClient, PollPolicy, RetrieveOptions, RetrieveReport, Settings,
    SubmitOptions, SubmitReport,
};

use crate::args::{BuildArgs, RetrieveArgs, SubmitArgs};

/// Scan images and write request-batch files
pub fn build(args: &BuildArgs, settings: &Settings) -> Result<BuildReport> {
    let mut options = BuildOptions::from_settings(settings);
    options.per_shard = args.per_jsonl;
    options.prefix = args.prefix.clone();
    options.output_dir = args.output_dir.clone();
    if args.fail_on_duplicate {
        options.duplicate_policy = DuplicatePolicy::Fail;
    }

    let report = build_request_batches(&args.image_directory, &options)
        .with_context(|| format!("Failed to build requests from {:?}", args.image_directory))?;

    print!("{}", format_build_report(&report));
    Ok(report)
}

/// Console report of a builder run
pub fn format_build_report(report: &BuildReport) -> String {
    let mut out = format!(
        "Total files: {}\nTotal images: {}\nTotal jsonl files: {}\n",
        report.total_files,
        report.total_images,
        report.shards.len()
    );
    for duplicate in &report.duplicates {
        out.push_str(&format!(
            "Duplicate unique ids found in batch {}\n",
            duplicate.shard
        ));
    }
    out
}

fn client(api_key: Option<&str>, settings: &Settings) -> Result<OpenAiBatchClient> {
    OpenAiBatchClient::with_base_url(api_key.unwrap_or_default(), &settings.api_base)
        .context("Failed to create batch API client")
}

/// Upload request-batch files and save the created batch ids
pub async fn submit(args: &SubmitArgs, settings: &Settings) -> Result<SubmitReport> {
    let client = client(args.api_key.as_deref(), settings)?;
    let options = SubmitOptions {
        prefix: args.prefix.clone(),
        output_prefix: args.output_prefix.clone(),
    };

    let report = submit_request_files(&client, &args.input_dir, &args.output_dir, &options)
        .await
        .context("Batch submission failed")?;

    print!("{}", format_submit_report(&report));
    Ok(report)
}

/// Console report of a submitter run
pub fn format_submit_report(report: &SubmitReport) -> String {
    let mut out = String::new();
    for batch in &report.batches {
        out.push_str(&format!(
            "Batch created for file {}: {} ({})\nBatch ID saved to {}\n",
            batch.request_file.display(),
            batch.batch_id,
            batch.status,
            batch.id_record.display()
        ));
    }
    out
}

/// Wait for submitted batches and download completed results.
///
/// `cancel` interrupts the wait; the CLI wires it to Ctrl+C.
pub async fn retrieve(
    args: &RetrieveArgs,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<RetrieveReport> {
    let client = client(args.api_key.as_deref(), settings)?;

    let mut poll = PollPolicy::from(settings);
    if let Some(secs) = args.poll_interval {
        poll.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.timeout {
        poll.timeout = Some(Duration::from_secs(secs));
    }

    let options = RetrieveOptions {
        batch_prefix: args.batch_prefix.clone(),
        output_prefix: args.output_prefix.clone(),
        output_dir: args.output_dir.clone(),
        poll,
    };

    let report = retrieve_results(&client, &args.batch_dir, &options, cancel)
        .await
        .context("Batch retrieval failed")?;

    print!("{}", format_retrieve_report(&report));
    Ok(report)
}

/// Console report of a retriever run
pub fn format_retrieve_report(report: &RetrieveReport) -> String {
    if report.batches.is_empty() {
        return "No batch ID files found in the specified directory.\n".to_string();
    }
    report
        .batches
        .iter()
        .map(|batch| format!("{}\n", batch.summary()))
        .collect()
}
