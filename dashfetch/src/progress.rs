//! Progress reporting for segment fetches.
//!
//! The coordinator emits [`ProgressEvent`]s from its collector thread as
//! fetches resolve. Reporters only observe: nothing they do can change which
//! fetches run or how a job ends.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// A fetch lifecycle event.
///
/// Counts refer to numbered segments only; the initialization block is
/// reported separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Fetching is about to begin.
    Started {
        /// Number of numbered segments in the job.
        total: usize,
    },
    /// The initialization block resolved.
    InitCompleted {
        /// Whether the fetch succeeded.
        ok: bool,
    },
    /// A numbered segment was fetched.
    SegmentCompleted {
        /// 1-based segment index.
        index: u32,
        /// Segments fetched successfully so far.
        succeeded: usize,
        /// Number of numbered segments in the job.
        total: usize,
    },
    /// A numbered segment failed.
    SegmentFailed {
        /// 1-based segment index.
        index: u32,
    },
    /// All dispatched fetches have resolved.
    Finished {
        /// Segments fetched successfully.
        succeeded: usize,
        /// Number of numbered segments in the job.
        total: usize,
    },
}

/// Sink for fetch progress events.
pub trait ProgressReporter: Send + Sync {
    /// Observe one event.
    fn observe(&self, event: &ProgressEvent);
}

impl<T: ProgressReporter + ?Sized> ProgressReporter for std::sync::Arc<T> {
    fn observe(&self, event: &ProgressEvent) {
        (**self).observe(event)
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn observe(&self, _event: &ProgressEvent) {}
}

/// Reporter that counts completions and keeps the event log.
#[derive(Debug, Default)]
pub struct CountingReporter {
    completed: AtomicUsize,
    failed: AtomicUsize,
    events: Mutex<Vec<ProgressEvent>>,
}

impl CountingReporter {
    /// Create an empty counting reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of segment completion events observed.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Number of segment failure events observed.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Snapshot of all observed events in arrival order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }
}

impl ProgressReporter for CountingReporter {
    fn observe(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::SegmentCompleted { .. } => {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            ProgressEvent::SegmentFailed { .. } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
        self.events.lock().push(event.clone());
    }
}

/// Callback invoked with `(segments_succeeded, total_segments)`.
pub type SegmentProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Reporter that forwards segment counts to a callback.
pub struct CallbackReporter {
    callback: SegmentProgressCallback,
}

impl CallbackReporter {
    /// Wrap a callback.
    pub fn new(callback: SegmentProgressCallback) -> Self {
        Self { callback }
    }
}

impl std::fmt::Debug for CallbackReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackReporter").finish_non_exhaustive()
    }
}

impl ProgressReporter for CallbackReporter {
    fn observe(&self, event: &ProgressEvent) {
        match *event {
            ProgressEvent::Started { total } => (self.callback)(0, total),
            ProgressEvent::SegmentCompleted {
                succeeded, total, ..
            } => (self.callback)(succeeded, total),
            _ => {}
        }
    }
}
