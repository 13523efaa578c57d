//! Fetch command - download one asset from a manifest blob on disk.

use std::path::PathBuf;

use dashfetch::job::{AssetDescriptor, JobRunner};

use super::common::{asset_id_for, job_reporter, read_manifest};
use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};
use crate::ui;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub manifest: PathBuf,
    pub output: PathBuf,
    pub workers: Option<usize>,
    pub token: Option<String>,
    pub placeholder: Option<String>,
    pub no_progress: bool,
}

/// Run the fetch command.
pub fn run(global: &GlobalOptions, args: FetchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("fetch");

    let blob = read_manifest(&args.manifest)?;

    let mut config = runner.download_config(args.workers);
    if let Some(placeholder) = args.placeholder {
        config = config.with_placeholder(placeholder);
    }
    let fetcher = runner.fetcher(&config, args.token.as_deref())?;

    let asset_id = asset_id_for(&args.output);
    let (reporter, bar) = job_reporter(&asset_id, !args.no_progress);
    let jobs = JobRunner::new(fetcher, config).with_reporter(reporter);

    let result = jobs.run(&AssetDescriptor::new(asset_id, &args.output), &blob);
    if let Some(bar) = bar {
        bar.clear();
    }

    let report = result?;
    ui::print_report(&report);
    Ok(())
}
