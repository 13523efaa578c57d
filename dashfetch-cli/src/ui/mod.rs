//! Terminal output helpers.

mod progress;

pub use progress::{batch_bar, BarReporter};

use console::style;
use dashfetch::JobReport;

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Print the outcome line for a completed job.
pub fn print_report(report: &JobReport) {
    println!(
        "{} {} ({} segments, {}, {:.1}s)",
        style("✓").green(),
        report.final_path.display(),
        report.segment_count,
        format_size(report.bytes_written),
        report.elapsed.as_secs_f64()
    );
}

/// Print a failure line.
pub fn print_failure(label: &str, error: &dyn std::fmt::Display) {
    eprintln!("{} {}: {}", style("✗").red(), label, error);
}
