//! Terminal progress bars.

use std::sync::atomic::{AtomicBool, Ordering};

use console::style;
use dashfetch::progress::{ProgressEvent, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};

const SEGMENT_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments {msg}";
const JOB_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

fn bar_style(template: &str) -> ProgressStyle {
    match ProgressStyle::with_template(template) {
        Ok(style) => style.progress_chars("█▓░"),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// Segment progress bar for a single job.
pub struct BarReporter {
    bar: ProgressBar,
    init_failed: AtomicBool,
}

impl BarReporter {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(bar_style(SEGMENT_TEMPLATE));
        bar.set_message(label.to_string());
        Self {
            bar,
            init_failed: AtomicBool::new(false),
        }
    }

    /// Remove the bar from the terminal.
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }

    /// True when the init block and every segment arrived.
    fn all_succeeded(&self, succeeded: usize, total: usize) -> bool {
        !self.init_failed.load(Ordering::Acquire) && succeeded == total
    }
}

impl ProgressReporter for BarReporter {
    fn observe(&self, event: &ProgressEvent) {
        match *event {
            ProgressEvent::Started { total } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(0);
            }
            ProgressEvent::InitCompleted { ok: false } => {
                self.init_failed.store(true, Ordering::Release);
                self.bar
                    .println(format!("{} init block failed", style("✗").red()));
            }
            ProgressEvent::InitCompleted { ok: true } => {}
            ProgressEvent::SegmentCompleted { succeeded, .. } => {
                self.bar.set_position(succeeded as u64);
            }
            ProgressEvent::SegmentFailed { index } => {
                self.bar
                    .println(format!("{} segment {} failed", style("✗").red(), index));
            }
            ProgressEvent::Finished { succeeded, total } => {
                if self.all_succeeded(succeeded, total) {
                    self.bar.finish();
                } else {
                    self.bar.abandon();
                }
            }
        }
    }
}

/// Bar counting finished jobs in a batch.
pub fn batch_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(bar_style(JOB_TEMPLATE));
    bar
}
