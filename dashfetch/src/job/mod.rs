//! End-to-end download jobs.
//!
//! A job turns one encoded manifest into one output file:
//!
//! ```text
//! Created ──decode──► (workspace) ──► Fetching ──► Assembling ──► Completed
//!    │                    │              │             │
//!    └────────────────────┴──────────────┴─────────────┴──────────► Failed
//! ```
//!
//! The workspace is acquired after the manifest decodes and released on
//! every path out of [`JobRunner::drive`], before the outcome is returned.

mod batch;
mod error;

pub use batch::{BatchItem, BatchRunner, BatchSummary, JobCallback, DEFAULT_CONCURRENT_JOBS};
pub use error::{JobError, JobResult};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::api::TrackInfo;
use crate::config::DownloadConfig;
use crate::coordinator::{DownloadCoordinator, FetchPlan, SegmentTask, UnitId};
use crate::fetch::{FetchError, SegmentFetcher};
use crate::manifest::{Manifest, ManifestDecoder};
use crate::progress::{NoopReporter, ProgressReporter};
use crate::reassemble::{AssemblyPlan, Reassembler};
use crate::tagging::{MetadataTagger, NoopTagger, TrackTags};
use crate::workspace::{Workspace, WorkspaceManager};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Created,
    Fetching,
    Assembling,
    Completed,
    Failed,
}

impl JobState {
    /// Whether the job has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Fetching => "fetching",
            Self::Assembling => "assembling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to download and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub asset_id: String,
    pub output: PathBuf,
    /// Descriptor used for tagging, if the caller has one.
    pub track: Option<TrackInfo>,
    /// Cover image to embed while tagging.
    pub cover: Option<PathBuf>,
}

impl AssetDescriptor {
    pub fn new(asset_id: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            asset_id: asset_id.into(),
            output: output.into(),
            track: None,
            cover: None,
        }
    }

    pub fn with_track(mut self, track: TrackInfo) -> Self {
        self.track = Some(track);
        self
    }

    pub fn with_cover(mut self, cover: impl Into<PathBuf>) -> Self {
        self.cover = Some(cover.into());
        self
    }
}

/// Record of one job's progress through its lifecycle.
#[derive(Debug)]
pub struct DownloadJob {
    asset_id: String,
    final_path: PathBuf,
    workspace_dir: Option<PathBuf>,
    init_path: Option<PathBuf>,
    tasks: Vec<SegmentTask>,
    state: JobState,
    history: Vec<JobState>,
}

impl DownloadJob {
    pub fn new(asset_id: impl Into<String>, final_path: impl Into<PathBuf>) -> Self {
        Self {
            asset_id: asset_id.into(),
            final_path: final_path.into(),
            workspace_dir: None,
            init_path: None,
            tasks: Vec::new(),
            state: JobState::Created,
            history: vec![JobState::Created],
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Workspace used by the job, once allocated. Gone from disk after the
    /// job ends.
    pub fn workspace_dir(&self) -> Option<&Path> {
        self.workspace_dir.as_deref()
    }

    pub fn init_path(&self) -> Option<&Path> {
        self.init_path.as_deref()
    }

    /// Segment tasks with their final outcomes.
    pub fn tasks(&self) -> &[SegmentTask] {
        &self.tasks
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state the job has been in, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    fn transition(&mut self, next: JobState) {
        if self.state.is_terminal() {
            return;
        }
        info!(asset = %self.asset_id, from = %self.state, to = %next, "Job state change");
        self.state = next;
        self.history.push(next);
    }
}

/// Summary of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub asset_id: String,
    pub final_path: PathBuf,
    /// Size of the output file.
    pub bytes_written: u64,
    pub segment_count: u32,
    pub elapsed: Duration,
}

/// Runs download jobs with a shared fetcher, reporter and tagger.
///
/// Each call to [`run`](Self::run) gets its own workspace and worker pool, so
/// one runner can drive several jobs at once.
pub struct JobRunner {
    fetcher: Arc<dyn SegmentFetcher>,
    reporter: Arc<dyn ProgressReporter>,
    tagger: Arc<dyn MetadataTagger>,
    decoder: ManifestDecoder,
    config: DownloadConfig,
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, config: DownloadConfig) -> Self {
        Self {
            fetcher,
            reporter: Arc::new(NoopReporter),
            tagger: Arc::new(NoopTagger),
            decoder: ManifestDecoder::new(),
            config,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_tagger(mut self, tagger: Arc<dyn MetadataTagger>) -> Self {
        self.tagger = tagger;
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// The fetcher shared by every job.
    pub fn fetcher(&self) -> &Arc<dyn SegmentFetcher> {
        &self.fetcher
    }

    /// Download one asset from its encoded manifest.
    pub fn run(&self, asset: &AssetDescriptor, manifest_blob: &str) -> JobResult<JobReport> {
        let mut job = DownloadJob::new(asset.asset_id.clone(), asset.output.clone());
        self.drive(&mut job, asset, manifest_blob)
    }

    /// Drive `job` to a terminal state.
    pub fn drive(
        &self,
        job: &mut DownloadJob,
        asset: &AssetDescriptor,
        manifest_blob: &str,
    ) -> JobResult<JobReport> {
        let started = Instant::now();
        let result = self.drive_inner(job, asset, manifest_blob);

        match &result {
            Ok(_) => job.transition(JobState::Completed),
            Err(e) => {
                warn!(asset = %job.asset_id, kind = e.kind(), error = %e, "Job failed");
                job.transition(JobState::Failed);
            }
        }

        result.map(|(bytes_written, segment_count)| JobReport {
            asset_id: job.asset_id.clone(),
            final_path: job.final_path.clone(),
            bytes_written,
            segment_count,
            elapsed: started.elapsed(),
        })
    }

    fn drive_inner(
        &self,
        job: &mut DownloadJob,
        asset: &AssetDescriptor,
        manifest_blob: &str,
    ) -> JobResult<(u64, u32)> {
        let manifest = self.decoder.decode(manifest_blob)?;
        manifest.validate_template(&self.config.placeholder)?;

        let workspace = WorkspaceManager::new(self.config.staging_root(&job.final_path))
            .acquire(&job.asset_id)?;
        job.workspace_dir = Some(workspace.path().to_path_buf());
        job.transition(JobState::Fetching);

        let outcome = self.fetch_and_assemble(job, asset, &manifest, &workspace);

        if let Err(e) = workspace.release() {
            warn!(asset = %job.asset_id, error = %e, "Workspace cleanup failed");
        }

        outcome.map(|bytes| (bytes, manifest.segment_count()))
    }

    fn fetch_and_assemble(
        &self,
        job: &mut DownloadJob,
        asset: &AssetDescriptor,
        manifest: &Manifest,
        workspace: &Workspace,
    ) -> JobResult<u64> {
        let plan = FetchPlan::for_workspace(
            manifest,
            &self.config.placeholder,
            workspace,
            &self.config.segment_extension,
        );
        job.init_path = Some(plan.init_path.clone());

        let mut report = DownloadCoordinator::new(Arc::clone(&self.fetcher), self.config.workers)
            .with_reporter(Arc::clone(&self.reporter))
            .run(plan);

        if !report.is_complete() {
            let failed = report.failure_count();
            let total = report.total_segments() + 1;
            let (unit, source) = report.take_first_failure().unwrap_or_else(|| {
                let error = FetchError::Transport {
                    url: manifest.init_url().to_string(),
                    reason: "fetch never resolved".to_string(),
                };
                (UnitId::Init, error)
            });
            job.tasks = std::mem::take(&mut report.tasks);
            return Err(JobError::SegmentFetchFailed {
                unit,
                failed,
                total,
                source,
            });
        }

        job.transition(JobState::Assembling);
        let assembly = AssemblyPlan::from_report(&report)?;
        job.tasks = std::mem::take(&mut report.tasks);

        let bytes = Reassembler::new().assemble(&assembly, &job.final_path)?;

        if let Some(track) = &asset.track {
            let tags = TrackTags::from_track(track);
            if let Err(e) = self
                .tagger
                .tag(&job.final_path, &tags, asset.cover.as_deref())
            {
                warn!(asset = %job.asset_id, error = %e, "Tagging failed, keeping untagged file");
            }
        }

        Ok(bytes)
    }
}
