//! Inspect command - decode a manifest without downloading anything.

use std::path::PathBuf;

use dashfetch::manifest::{ManifestDecoder, DEFAULT_PLACEHOLDER};

use super::common::read_manifest;
use crate::error::CliError;

/// Arguments for the inspect command.
pub struct InspectArgs {
    pub manifest: PathBuf,
    pub placeholder: Option<String>,
    pub urls: bool,
}

/// Run the inspect command.
pub fn run(args: InspectArgs) -> Result<(), CliError> {
    let blob = read_manifest(&args.manifest)?;
    let manifest = ManifestDecoder::new().decode(&blob)?;
    let placeholder = args.placeholder.as_deref().unwrap_or(DEFAULT_PLACEHOLDER);

    println!("Init URL:       {}", manifest.init_url());
    println!("Media template: {}", manifest.media_template());
    println!("Segments:       {}", manifest.segment_count());

    if let Err(e) = manifest.validate_template(placeholder) {
        println!("Warning:        {}", e);
        return Ok(());
    }

    if args.urls {
        println!();
        for (index, url) in manifest.segment_urls(placeholder) {
            println!("  {:>4}  {}", index, url);
        }
    }

    Ok(())
}
