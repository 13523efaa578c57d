//! Download configuration.
//!
//! [`DownloadConfig`] is the runtime configuration of one job runner.
//! [`ConfigFile`] is the on-disk INI file the CLI reads it from.

mod file;

pub use file::{
    default_config_path, ApiSettings, ConfigError, ConfigFile, DownloadSettings, LoggingSettings,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::DEFAULT_WORKERS;
use crate::fetch::DEFAULT_TIMEOUT_SECS;
use crate::manifest::DEFAULT_PLACEHOLDER;

/// Default extension for workspace unit files.
pub const DEFAULT_SEGMENT_EXTENSION: &str = "mp4";

/// Configuration for running download jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Maximum concurrent fetches per job.
    pub workers: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Segment number token in the media template.
    ///
    /// Defaults to `$Number$`. Jobs whose template uses any other token,
    /// such as `$N$`, fail as `ManifestInvalid` before fetching unless the
    /// token is set with [`with_placeholder`](Self::with_placeholder).
    pub placeholder: String,
    /// Extension of workspace unit files.
    pub segment_extension: String,
    /// Root for job workspaces. `None` puts them next to the output file.
    pub staging_dir: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            segment_extension: DEFAULT_SEGMENT_EXTENSION.to_string(),
            staging_dir: None,
        }
    }
}

impl DownloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of concurrent fetches (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_segment_extension(mut self, extension: impl Into<String>) -> Self {
        self.segment_extension = extension.into();
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Workspace root for a job writing to `output`.
    pub fn staging_root(&self, output: &Path) -> PathBuf {
        match &self.staging_dir {
            Some(dir) => dir.clone(),
            None => output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}
