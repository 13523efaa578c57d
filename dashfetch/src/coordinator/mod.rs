//! Concurrent fetching of one asset's units.
//!
//! The coordinator owns a fixed pool of worker threads for the duration of a
//! run. Workers pull units from a shared queue, fetch them, and send the
//! outcome back over a channel. Only the collector loop on the calling thread
//! touches the [`FetchReport`] or emits progress events.
//!
//! ```text
//!              ┌──────────┐  FetchUnit   ┌──────────┐
//!  FetchPlan ─►│collector │─────────────►│ worker 1 │──┐
//!              │ (caller) │              │   ...    │  │ UnitResult
//!              │          │◄─────────────│ worker W │◄─┘
//!              └────┬─────┘              └──────────┘
//!                   ▼
//!             FetchReport + ProgressEvents
//! ```
//!
//! At most `W` units are in flight at once. After the first failure the
//! collector stops dispatching; fetches already running drain to completion
//! and the rest of the plan stays [`TaskOutcome::Pending`].

mod report;
mod task;

pub use report::FetchReport;
pub use task::{FetchPlan, FetchUnit, SegmentTask, TaskOutcome, UnitId};

use std::collections::VecDeque;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::fetch::{partial_path, FetchError, FetchResult, SegmentFetcher};
use crate::progress::{NoopReporter, ProgressEvent, ProgressReporter};

/// Default number of concurrent fetches.
pub const DEFAULT_WORKERS: usize = 4;

/// Outcome of one unit, sent from a worker to the collector.
struct UnitResult {
    id: UnitId,
    result: FetchResult<u64>,
}

/// Runs a [`FetchPlan`] on a bounded worker pool.
pub struct DownloadCoordinator {
    fetcher: Arc<dyn SegmentFetcher>,
    reporter: Arc<dyn ProgressReporter>,
    workers: usize,
}

impl DownloadCoordinator {
    /// Create a coordinator with `workers` concurrent fetches (minimum 1).
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, workers: usize) -> Self {
        Self {
            fetcher,
            reporter: Arc::new(NoopReporter),
            workers: workers.max(1),
        }
    }

    /// Attach a progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Maximum number of concurrent fetches.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every unit of `plan` and collect the outcomes.
    ///
    /// Blocks until every dispatched fetch has resolved. Never fails as a
    /// whole: per-unit failures are recorded in the returned report.
    pub fn run(&self, plan: FetchPlan) -> FetchReport {
        let mut queue: VecDeque<FetchUnit> = plan.units().into();
        let mut report = FetchReport::new(plan);
        let total = report.total_segments();
        let pool_size = self.workers.min(queue.len()).max(1);

        debug!(
            segments = total,
            workers = pool_size,
            "Starting segment fetch"
        );
        self.reporter.observe(&ProgressEvent::Started { total });

        let (work_tx, work_rx) = mpsc::channel::<FetchUnit>();
        let (result_tx, result_rx) = mpsc::channel::<UnitResult>();
        let work_rx = Mutex::new(work_rx);
        let fetcher: &dyn SegmentFetcher = self.fetcher.as_ref();

        thread::scope(|scope| {
            for worker in 0..pool_size {
                let work_rx = &work_rx;
                let result_tx = result_tx.clone();
                scope.spawn(move || worker_loop(worker, fetcher, work_rx, result_tx));
            }
            drop(result_tx);

            let mut in_flight = 0usize;
            let mut halted = false;

            loop {
                while !halted && in_flight < pool_size {
                    let Some(unit) = queue.pop_front() else {
                        break;
                    };
                    if work_tx.send(unit).is_err() {
                        break;
                    }
                    in_flight += 1;
                }

                if in_flight == 0 {
                    break;
                }

                let Ok(UnitResult { id, result }) = result_rx.recv() else {
                    break;
                };
                in_flight -= 1;

                let failed = result.is_err();
                self.collect(&mut report, id, result);

                if failed && !halted {
                    halted = true;
                    debug!(
                        unit = %id,
                        in_flight,
                        undispatched = queue.len(),
                        "Fetch failed, draining in-flight units"
                    );
                }
            }

            // Closing the queue lets idle workers exit before the scope joins.
            drop(work_tx);
        });

        let succeeded = report.succeeded_segments();
        self.reporter
            .observe(&ProgressEvent::Finished { succeeded, total });
        debug!(
            succeeded,
            total,
            failed = report.failure_count(),
            bytes = report.bytes_fetched(),
            "Segment fetch finished"
        );

        report
    }

    fn collect(&self, report: &mut FetchReport, id: UnitId, result: FetchResult<u64>) {
        let ok = result.is_ok();
        let outcome = match result {
            Ok(bytes) => TaskOutcome::Succeeded { bytes },
            Err(e) => {
                warn!(unit = %id, error = %e, "Unit fetch failed");
                TaskOutcome::Failed(e)
            }
        };
        report.record(id, outcome);

        let event = match id {
            UnitId::Init => ProgressEvent::InitCompleted { ok },
            UnitId::Segment(index) if ok => ProgressEvent::SegmentCompleted {
                index,
                succeeded: report.succeeded_segments(),
                total: report.total_segments(),
            },
            UnitId::Segment(index) => ProgressEvent::SegmentFailed { index },
        };
        self.reporter.observe(&event);
    }
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

fn worker_loop(
    worker: usize,
    fetcher: &dyn SegmentFetcher,
    work: &Mutex<Receiver<FetchUnit>>,
    results: Sender<UnitResult>,
) {
    loop {
        let unit = match work.lock().recv() {
            Ok(unit) => unit,
            Err(_) => break,
        };
        debug!(worker, unit = %unit.id, url = %unit.url, "Fetching unit");

        let result = fetch_guarded(fetcher, &unit);
        if results.send(UnitResult { id: unit.id, result }).is_err() {
            break;
        }
    }
}

/// Run one fetch, turning a panic into an ordinary failure.
fn fetch_guarded(fetcher: &dyn SegmentFetcher, unit: &FetchUnit) -> FetchResult<u64> {
    panic::catch_unwind(AssertUnwindSafe(|| fetcher.fetch(&unit.url, &unit.dest))).unwrap_or_else(
        |_| {
            fs::remove_file(partial_path(&unit.dest)).ok();
            fs::remove_file(&unit.dest).ok();
            Err(FetchError::WorkerPanicked {
                url: unit.url.clone(),
            })
        },
    )
}
