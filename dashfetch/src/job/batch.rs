//! Running several jobs at once.
//!
//! Each job keeps its own workspace and fetch pool; the batch only bounds how
//! many jobs run concurrently. Results come back in input order whatever
//! order the jobs finish in.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, info};

use super::{AssetDescriptor, JobReport, JobResult, JobRunner};

/// Default number of jobs run concurrently.
pub const DEFAULT_CONCURRENT_JOBS: usize = 3;

/// Invoked on the calling thread as each job finishes.
pub type JobCallback = Box<dyn Fn(&str, &JobResult<JobReport>) + Send + Sync>;

/// One job in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub asset: AssetDescriptor,
    /// Encoded manifest blob.
    pub manifest: String,
}

impl BatchItem {
    pub fn new(asset: AssetDescriptor, manifest: impl Into<String>) -> Self {
        Self {
            asset,
            manifest: manifest.into(),
        }
    }
}

/// Per-job results of a batch, in input order.
#[derive(Debug)]
pub struct BatchSummary {
    pub results: Vec<(String, JobResult<JobReport>)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Whether at least one job produced an output.
    pub fn any_succeeded(&self) -> bool {
        self.succeeded() > 0
    }
}

/// Runs jobs with bounded concurrency.
pub struct BatchRunner {
    jobs: usize,
    on_finished: Option<JobCallback>,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENT_JOBS)
    }
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Run at most `jobs` jobs at once (minimum 1).
    pub fn new(jobs: usize) -> Self {
        Self {
            jobs: jobs.max(1),
            on_finished: None,
        }
    }

    pub fn with_callback(mut self, callback: JobCallback) -> Self {
        self.on_finished = Some(callback);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every item through `runner`.
    pub fn run(&self, runner: &JobRunner, items: &[BatchItem]) -> BatchSummary {
        self.run_with(items, |item| {
            (
                item.asset.asset_id.clone(),
                runner.run(&item.asset, &item.manifest),
            )
        })
    }

    /// Run `job` for every item. `job` returns the asset id and its result.
    ///
    /// A failed job never stops the others.
    pub fn run_with<T, F>(&self, items: &[T], job: F) -> BatchSummary
    where
        T: Sync,
        F: Fn(&T) -> (String, JobResult<JobReport>) + Sync,
    {
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        let mut slots: Vec<Option<(String, JobResult<JobReport>)>> =
            (0..items.len()).map(|_| None).collect();

        info!(jobs = items.len(), concurrency = self.jobs, "Starting batch");

        thread::scope(|scope| {
            for _ in 0..self.jobs.min(items.len()) {
                let tx = tx.clone();
                let next = &next;
                let job = &job;
                scope.spawn(move || loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    if tx.send((index, job(item))).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (index, outcome) in rx {
                debug!(index, asset = %outcome.0, ok = outcome.1.is_ok(), "Batch job finished");
                if let Some(callback) = &self.on_finished {
                    callback(&outcome.0, &outcome.1);
                }
                slots[index] = Some(outcome);
            }
        });

        let summary = BatchSummary {
            results: slots.into_iter().flatten().collect(),
        };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Batch finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloadConfig;
    use crate::job::JobError;
    use crate::manifest::ManifestError;
    use crate::testing::MockFetcher;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn report(id: &str) -> JobReport {
        JobReport {
            asset_id: id.to_string(),
            final_path: id.into(),
            bytes_written: 1,
            segment_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_results_keep_input_order() {
        let items: Vec<u64> = vec![30, 5, 20, 1];
        let summary = BatchRunner::new(3).run_with(&items, |ms| {
            thread::sleep(Duration::from_millis(*ms));
            (ms.to_string(), Ok(report(&ms.to_string())))
        });

        let ids: Vec<_> = summary.results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["30", "5", "20", "1"]);
        assert_eq!(summary.succeeded(), 4);
    }

    #[test]
    fn test_failures_do_not_stop_batch() {
        let items = vec![1, 2, 3];
        let summary = BatchRunner::new(2).run_with(&items, |n| {
            let result = if *n == 2 {
                Err(JobError::from(ManifestError::MissingDescriptor))
            } else {
                Ok(report("x"))
            };
            (n.to_string(), result)
        });

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failed(), 1);
        assert!(summary.any_succeeded());
    }

    #[test]
    fn test_callback_sees_every_job() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let runner = BatchRunner::new(2).with_callback(Box::new(move |id, result| {
            seen_clone.lock().push((id.to_string(), result.is_ok()));
        }));

        runner.run_with(&[1, 2], |n| (n.to_string(), Ok(report("x"))));

        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, vec![("1".to_string(), true), ("2".to_string(), true)]);
    }

    #[test]
    fn test_run_with_job_runner() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = JobRunner::new(Arc::new(MockFetcher::new()), DownloadConfig::new());
        let items = vec![BatchItem::new(
            AssetDescriptor::new("bad", temp.path().join("bad.flac")),
            "nope",
        )];

        let summary = BatchRunner::default().run(&runner, &items);

        assert_eq!(summary.total(), 1);
        assert!(matches!(
            summary.results[0].1,
            Err(JobError::ManifestInvalid(_))
        ));
    }

    #[test]
    fn test_empty_batch() {
        let items: Vec<BatchItem> = Vec::new();
        let runner = JobRunner::new(Arc::new(MockFetcher::new()), DownloadConfig::new());
        let summary = BatchRunner::default().run(&runner, &items);
        assert_eq!(summary.total(), 0);
        assert!(!summary.any_succeeded());
    }
}
