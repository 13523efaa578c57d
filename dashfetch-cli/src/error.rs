//! CLI error type and exit codes.

use std::path::PathBuf;

use dashfetch::api::ApiError;
use dashfetch::config::ConfigError;
use dashfetch::logging::LoggingError;
use dashfetch::{FetchError, JobError, ManifestError};
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("download failed: {0}")]
    Job(#[from] JobError),

    #[error("catalog API error: {0}")]
    Api(#[from] ApiError),

    #[error("HTTP client error: {0}")]
    Http(#[from] FetchError),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{failed} of {total} downloads failed")]
    Batch { failed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// `2` for problems with the invocation or its inputs, `1` for failed
    /// downloads.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_)
            | Self::ConfigFile(_)
            | Self::Logging(_)
            | Self::Manifest(_)
            | Self::Read { .. } => 2,
            Self::Job(JobError::ManifestInvalid(_)) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 2);
        assert_eq!(
            CliError::Job(JobError::from(ManifestError::MissingDescriptor)).exit_code(),
            2
        );
        assert_eq!(CliError::Batch { failed: 1, total: 2 }.exit_code(), 1);
    }
}
