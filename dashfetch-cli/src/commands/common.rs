//! Common helpers shared across CLI commands.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashfetch::progress::{NoopReporter, ProgressReporter};

use crate::error::CliError;
use crate::ui::BarReporter;

/// Read an encoded manifest from a file, or from stdin when `source` is `-`.
pub fn read_manifest(source: &Path) -> Result<String, CliError> {
    let text = if source == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::Read {
                path: source.to_path_buf(),
                source: e,
            })?;
        buf
    } else {
        fs::read_to_string(source).map_err(|e| CliError::Read {
            path: source.to_path_buf(),
            source: e,
        })?
    };
    Ok(text.trim().to_string())
}

/// Asset id for an output path: its file stem.
pub fn asset_id_for(output: &Path) -> String {
    output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "asset".to_string())
}

/// Progress sink for one job, plus the bar to clear afterwards.
pub fn job_reporter(
    label: &str,
    show_progress: bool,
) -> (Arc<dyn ProgressReporter>, Option<Arc<BarReporter>>) {
    if show_progress {
        let bar = Arc::new(BarReporter::new(label));
        (bar.clone(), Some(bar))
    } else {
        (Arc::new(NoopReporter), None)
    }
}

/// `*.manifest` files directly inside `dir`, sorted by name.
pub fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let entries = fs::read_dir(dir).map_err(|e| CliError::Read {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "manifest"))
        .collect();
    files.sort();
    Ok(files)
}
