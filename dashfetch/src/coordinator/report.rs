//! Aggregated result of one coordinator run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::task::{FetchPlan, SegmentTask, TaskOutcome, UnitId};
use crate::fetch::FetchError;

/// Per-unit outcomes collected by the coordinator.
///
/// Only the coordinator's collector writes to a report. Once returned it is
/// a plain value owned by the job.
#[derive(Debug)]
pub struct FetchReport {
    pub init_path: PathBuf,
    pub init: TaskOutcome,
    pub tasks: Vec<SegmentTask>,
    /// Failed units in the order their outcomes arrived.
    failure_order: Vec<UnitId>,
}

impl FetchReport {
    pub(crate) fn new(plan: FetchPlan) -> Self {
        Self {
            init_path: plan.init_path,
            init: TaskOutcome::Pending,
            tasks: plan.tasks,
            failure_order: Vec::new(),
        }
    }

    /// Record the outcome of one unit.
    ///
    /// Tasks are stored by ascending index, so segment `n` lives at `n - 1`.
    pub(crate) fn record(&mut self, id: UnitId, outcome: TaskOutcome) {
        if outcome.is_failed() {
            self.failure_order.push(id);
        }
        match id {
            UnitId::Init => self.init = outcome,
            UnitId::Segment(index) => {
                if let Some(task) = self.task_mut(index) {
                    task.outcome = outcome;
                }
            }
        }
    }

    fn task_mut(&mut self, index: u32) -> Option<&mut SegmentTask> {
        (index as usize)
            .checked_sub(1)
            .and_then(|slot| self.tasks.get_mut(slot))
    }

    /// Total number of numbered segments.
    pub fn total_segments(&self) -> usize {
        self.tasks.len()
    }

    /// Number of segments fetched successfully.
    pub fn succeeded_segments(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.outcome.is_succeeded())
            .count()
    }

    /// Number of units (init included) that failed.
    pub fn failure_count(&self) -> usize {
        self.failure_order.len()
    }

    /// Number of segments never dispatched because the run stopped early.
    pub fn skipped_segments(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, TaskOutcome::Pending))
            .count()
    }

    /// Whether the initialization block and every segment were fetched.
    pub fn is_complete(&self) -> bool {
        self.init.is_succeeded() && self.tasks.iter().all(|t| t.outcome.is_succeeded())
    }

    /// Failed units in arrival order.
    pub fn failed_units(&self) -> &[UnitId] {
        &self.failure_order
    }

    /// Bytes written to the workspace across all successful units.
    pub fn bytes_fetched(&self) -> u64 {
        std::iter::once(&self.init)
            .chain(self.tasks.iter().map(|t| &t.outcome))
            .map(|outcome| match outcome {
                TaskOutcome::Succeeded { bytes } => *bytes,
                _ => 0,
            })
            .sum()
    }

    /// Remove and return the error of the first unit that failed.
    pub fn take_first_failure(&mut self) -> Option<(UnitId, FetchError)> {
        let id = *self.failure_order.first()?;
        let slot = match id {
            UnitId::Init => &mut self.init,
            UnitId::Segment(index) => &mut self.task_mut(index)?.outcome,
        };
        match std::mem::take(slot) {
            TaskOutcome::Failed(error) => Some((id, error)),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Segment files keyed by index, when every unit succeeded.
    pub fn completed_segments(&self) -> Option<BTreeMap<u32, PathBuf>> {
        if !self.is_complete() {
            return None;
        }
        Some(
            self.tasks
                .iter()
                .map(|t| (t.index, t.local_path.clone()))
                .collect(),
        )
    }

    /// Location of the initialization block.
    pub fn init_path(&self) -> &Path {
        &self.init_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn report(segments: u32) -> FetchReport {
        let manifest = Manifest::new("https://x/init", "https://x/seg_$N$", segments);
        FetchReport::new(FetchPlan::new(&manifest, "$N$", Path::new("/ws"), "mp4"))
    }

    fn failure() -> TaskOutcome {
        TaskOutcome::Failed(FetchError::Status {
            url: "https://x/seg_2".to_string(),
            status: 500,
        })
    }

    #[test]
    fn test_complete_report() {
        let mut report = report(2);
        report.record(UnitId::Init, TaskOutcome::Succeeded { bytes: 10 });
        report.record(UnitId::Segment(2), TaskOutcome::Succeeded { bytes: 5 });
        assert!(!report.is_complete());
        assert!(report.completed_segments().is_none());

        report.record(UnitId::Segment(1), TaskOutcome::Succeeded { bytes: 7 });

        assert!(report.is_complete());
        assert_eq!(report.bytes_fetched(), 22);
        assert_eq!(report.succeeded_segments(), 2);
        let segments = report.completed_segments().unwrap();
        assert_eq!(
            segments.keys().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_failures_are_kept_in_arrival_order() {
        let mut report = report(3);
        report.record(UnitId::Segment(3), failure());
        report.record(UnitId::Init, TaskOutcome::Succeeded { bytes: 1 });
        report.record(UnitId::Segment(2), failure());

        assert_eq!(
            report.failed_units(),
            &[UnitId::Segment(3), UnitId::Segment(2)]
        );
        assert_eq!(report.failure_count(), 2);
        assert_eq!(report.skipped_segments(), 1);
        assert!(!report.is_complete());

        let (id, error) = report.take_first_failure().unwrap();
        assert_eq!(id, UnitId::Segment(3));
        assert!(matches!(error, FetchError::Status { status: 500, .. }));
    }

    #[test]
    fn test_init_only_report() {
        let mut report = report(0);
        report.record(UnitId::Init, TaskOutcome::Succeeded { bytes: 3 });

        assert!(report.is_complete());
        assert!(report.completed_segments().unwrap().is_empty());
    }
}
