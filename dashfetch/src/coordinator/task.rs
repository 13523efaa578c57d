//! Fetch units and their recorded outcomes.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::fetch::FetchError;
use crate::manifest::Manifest;
use crate::workspace::Workspace;

/// Identifies one addressable unit of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitId {
    /// The initialization block.
    Init,
    /// A numbered segment (1-based).
    Segment(u32),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Segment(index) => write!(f, "segment {}", index),
        }
    }
}

/// One fetch handed to a pool worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchUnit {
    pub id: UnitId,
    pub url: String,
    pub dest: PathBuf,
}

/// Outcome of one unit fetch.
#[derive(Debug, Default)]
pub enum TaskOutcome {
    /// Not yet resolved, or never dispatched.
    #[default]
    Pending,
    /// Fetched completely.
    Succeeded {
        /// Bytes written to the workspace.
        bytes: u64,
    },
    /// Failed; the destination holds no file.
    Failed(FetchError),
}

impl TaskOutcome {
    /// Whether the fetch completed.
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Whether the fetch failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A numbered segment owned by the coordinator.
#[derive(Debug)]
pub struct SegmentTask {
    pub index: u32,
    pub url: String,
    pub local_path: PathBuf,
    pub outcome: TaskOutcome,
}

impl SegmentTask {
    fn unit(&self) -> FetchUnit {
        FetchUnit {
            id: UnitId::Segment(self.index),
            url: self.url.clone(),
            dest: self.local_path.clone(),
        }
    }
}

/// Everything the coordinator needs to fetch one asset.
///
/// Built once from a decoded manifest; tasks are kept in ascending index
/// order.
#[derive(Debug)]
pub struct FetchPlan {
    pub init_url: String,
    pub init_path: PathBuf,
    pub tasks: Vec<SegmentTask>,
}

impl FetchPlan {
    /// Lay out every unit of `manifest` inside `dir`.
    pub fn new(manifest: &Manifest, placeholder: &str, dir: &Path, extension: &str) -> Self {
        let tasks = manifest
            .segment_urls(placeholder)
            .map(|(index, url)| SegmentTask {
                index,
                url,
                local_path: dir.join(format!("segment_{:03}.{}", index, extension)),
                outcome: TaskOutcome::Pending,
            })
            .collect();

        Self {
            init_url: manifest.init_url().to_string(),
            init_path: dir.join(format!("init.{}", extension)),
            tasks,
        }
    }

    /// Lay out every unit of `manifest` inside a job workspace.
    pub fn for_workspace(
        manifest: &Manifest,
        placeholder: &str,
        workspace: &Workspace,
        extension: &str,
    ) -> Self {
        Self::new(manifest, placeholder, workspace.path(), extension)
    }

    /// Number of numbered segments.
    pub fn segment_count(&self) -> usize {
        self.tasks.len()
    }

    /// Units in dispatch order: the initialization block first, then
    /// segments by ascending index.
    pub(crate) fn units(&self) -> Vec<FetchUnit> {
        let init = FetchUnit {
            id: UnitId::Init,
            url: self.init_url.clone(),
            dest: self.init_path.clone(),
        };
        std::iter::once(init)
            .chain(self.tasks.iter().map(SegmentTask::unit))
            .collect()
    }
}
