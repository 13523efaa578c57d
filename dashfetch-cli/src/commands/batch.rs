//! Batch command - one job per manifest file in a directory.

use std::path::{Path, PathBuf};

use dashfetch::job::{
    AssetDescriptor, BatchItem, BatchRunner, JobReport, JobResult, JobRunner,
    DEFAULT_CONCURRENT_JOBS,
};
use tracing::warn;

use super::common::{asset_id_for, manifest_files, read_manifest};
use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};
use crate::ui;

/// Extension given to outputs.
const OUTPUT_EXTENSION: &str = "flac";

/// Arguments for the batch command.
pub struct BatchArgs {
    pub manifest_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub workers: Option<usize>,
    pub token: Option<String>,
    pub placeholder: Option<String>,
    pub no_progress: bool,
}

/// Run the batch command.
pub fn run(global: &GlobalOptions, args: BatchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("batch");

    let files = manifest_files(&args.manifest_dir)?;
    if files.is_empty() {
        println!(
            "No .manifest files found in {}",
            args.manifest_dir.display()
        );
        return Ok(());
    }

    let output_dir = runner.output_dir(args.output_dir.as_deref());
    let items = batch_items(&files, &output_dir)?;

    let mut config = runner.download_config(args.workers);
    if let Some(placeholder) = args.placeholder {
        config = config.with_placeholder(placeholder);
    }
    let fetcher = runner.fetcher(&config, args.token.as_deref())?;
    let jobs = JobRunner::new(fetcher, config);

    let bar = (!args.no_progress).then(|| ui::batch_bar(items.len()));
    let callback_bar = bar.clone();
    let batch = BatchRunner::new(args.jobs.unwrap_or(DEFAULT_CONCURRENT_JOBS)).with_callback(
        Box::new(move |asset_id: &str, result: &JobResult<JobReport>| {
            if let Some(bar) = &callback_bar {
                bar.inc(1);
                bar.set_message(asset_id.to_string());
            }
            if let Err(e) = result {
                warn!(asset = asset_id, error = %e, "Batch item failed");
            }
        }),
    );

    let summary = batch.run(&jobs, &items);

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    for (asset_id, result) in &summary.results {
        match result {
            Ok(report) => ui::print_report(report),
            Err(e) => ui::print_failure(asset_id, e),
        }
    }
    println!();
    println!(
        "{} of {} downloads succeeded",
        summary.succeeded(),
        summary.total()
    );

    if summary.failed() > 0 {
        return Err(CliError::Batch {
            failed: summary.failed(),
            total: summary.total(),
        });
    }
    Ok(())
}

/// Read every manifest up front so an unreadable file fails the batch before
/// any download starts.
fn batch_items(files: &[PathBuf], output_dir: &Path) -> Result<Vec<BatchItem>, CliError> {
    files
        .iter()
        .map(|path| {
            let asset_id = asset_id_for(path);
            let output = output_dir.join(format!("{}.{}", asset_id, OUTPUT_EXTENSION));
            let manifest = read_manifest(path)?;
            Ok(BatchItem::new(AssetDescriptor::new(asset_id, output), manifest))
        })
        .collect()
}
