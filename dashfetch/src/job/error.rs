//! Job-level error taxonomy.

use thiserror::Error;

use crate::coordinator::UnitId;
use crate::fetch::FetchError;
use crate::manifest::ManifestError;
use crate::reassemble::ReassemblyError;
use crate::workspace::WorkspaceError;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Why a job ended in [`JobState::Failed`](super::JobState::Failed).
#[derive(Debug, Error)]
pub enum JobError {
    /// The manifest could not be decoded or cannot address segments.
    #[error("manifest invalid: {0}")]
    ManifestInvalid(#[from] ManifestError),

    /// At least one unit could not be fetched.
    #[error("{failed} of {total} units failed, first {unit}: {source}")]
    SegmentFetchFailed {
        /// The first unit whose failure was observed.
        unit: UnitId,
        failed: usize,
        /// Units in the job, init block included.
        total: usize,
        source: FetchError,
    },

    /// Concatenation into the output file failed.
    #[error("reassembly failed: {0}")]
    ReassemblyFailed(#[from] ReassemblyError),

    /// The workspace could not be allocated.
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
}

impl JobError {
    /// Whether running the same job again might succeed.
    ///
    /// Only fetch failures qualify; a bad manifest stays bad.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SegmentFetchFailed { .. })
    }

    /// Short machine-friendly category name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ManifestInvalid(_) => "manifest_invalid",
            Self::SegmentFetchFailed { .. } => "segment_fetch_failed",
            Self::ReassemblyFailed(_) => "reassembly_failed",
            Self::Workspace(_) => "workspace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fetch_failures_are_retryable() {
        let fetch = JobError::SegmentFetchFailed {
            unit: UnitId::Segment(3),
            failed: 1,
            total: 6,
            source: FetchError::Status {
                url: "https://x/seg_3".to_string(),
                status: 500,
            },
        };
        assert!(fetch.is_retryable());
        assert_eq!(fetch.kind(), "segment_fetch_failed");
        assert!(fetch.to_string().contains("segment 3"));

        let manifest = JobError::from(ManifestError::MissingDescriptor);
        assert!(!manifest.is_retryable());
        assert_eq!(manifest.kind(), "manifest_invalid");

        let reassembly = JobError::from(ReassemblyError::Incomplete);
        assert!(!reassembly.is_retryable());
    }
}
