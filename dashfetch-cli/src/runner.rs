//! Shared command setup: configuration loading and logging.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashfetch::config::{ConfigFile, DownloadConfig};
use dashfetch::fetch::{HttpFetcher, Session};
use dashfetch::logging::{init_logging, LogGuard};
use tracing::info;

use crate::error::CliError;

/// Global options every command accepts.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub verbose: u8,
    pub log_file: Option<PathBuf>,
}

/// Loaded configuration plus the logging guard for one CLI invocation.
pub struct CliRunner {
    config: ConfigFile,
    _log: LogGuard,
}

impl CliRunner {
    /// Load the configuration file and install logging.
    ///
    /// `--log-file` wins over the configured file. Without `-v` the
    /// configured level applies; `-v` selects debug and `-vv` or more trace.
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let config = match &options.config {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                ConfigFile::load(path)?
            }
            None => ConfigFile::load_default()?,
        };

        let level = verbosity_level(&config.logging.level, options.verbose);
        let log_file = options
            .log_file
            .as_deref()
            .or(config.logging.file.as_deref());
        let log = init_logging(&level, log_file)?;

        Ok(Self { config, _log: log })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Record the command being run.
    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            workers = self.config.download.workers,
            "dashfetch starting"
        );
    }

    /// Download configuration with an optional worker override.
    pub fn download_config(&self, workers: Option<usize>) -> DownloadConfig {
        let config = self.config.to_download_config();
        match workers {
            Some(n) => config.with_workers(n),
            None => config,
        }
    }

    /// HTTP fetcher using the configured timeout and optional session.
    pub fn fetcher(
        &self,
        config: &DownloadConfig,
        token: Option<&str>,
    ) -> Result<Arc<HttpFetcher>, CliError> {
        let fetcher = HttpFetcher::with_timeout(config.timeout)?;
        let fetcher = match token {
            Some(token) => fetcher.with_session(Session::new(token)),
            None => fetcher,
        };
        Ok(Arc::new(fetcher))
    }

    /// Output directory: CLI flag, then config, then `<music dir>/dashfetch`,
    /// then the current directory.
    pub fn output_dir(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.config.download.output_dir.clone())
            .or_else(|| dirs::audio_dir().map(|dir| dir.join("dashfetch")))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Effective log level for a configured level and `-v` count.
pub fn verbosity_level(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}
