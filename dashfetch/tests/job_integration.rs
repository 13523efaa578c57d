//! Integration tests for complete download jobs.
//!
//! These tests drive the full pipeline with the in-memory `MockFetcher`:
//! - manifest decoding and segment count derivation
//! - concurrent fetching with arbitrary completion order
//! - ordered reassembly and workspace cleanup
//!
//! Run with: `cargo test --test job_integration`

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use tempfile::TempDir;

use dashfetch::config::DownloadConfig;
use dashfetch::job::{AssetDescriptor, DownloadJob, JobError, JobRunner, JobState};
use dashfetch::manifest::ManifestDecoder;
use dashfetch::progress::{CountingReporter, ProgressEvent};
use dashfetch::testing::MockFetcher;

// ============================================================================
// Helper Functions
// ============================================================================

const INIT_URL: &str = "https://x/init";
const TEMPLATE: &str = "https://x/seg_$N$";

/// Encode a manifest with the given timeline as `(duration, repeat)` pairs.
fn encode_manifest(init: Option<&str>, media: Option<&str>, timeline: &[(u64, Option<u32>)]) -> String {
    let mut template = String::from("<SegmentTemplate");
    if let Some(init) = init {
        template.push_str(&format!(r#" initialization="{}""#, init));
    }
    if let Some(media) = media {
        template.push_str(&format!(r#" media="{}""#, media));
    }
    template.push('>');
    if !timeline.is_empty() {
        template.push_str("<SegmentTimeline>");
        for (d, r) in timeline {
            match r {
                Some(r) => template.push_str(&format!(r#"<S d="{}" r="{}"/>"#, d, r)),
                None => template.push_str(&format!(r#"<S d="{}"/>"#, d)),
            }
        }
        template.push_str("</SegmentTimeline>");
    }
    template.push_str("</SegmentTemplate>");

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
  <Period>
    <AdaptationSet contentType="audio">
      <Representation id="FLAC,44100,16" bandwidth="1000">
        {}
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#,
        template
    );
    STANDARD.encode(xml)
}

fn segment_body(index: u32) -> Vec<u8> {
    format!("<segment {:03}>", index).into_bytes()
}

/// Mock transport serving the init block and `segments` numbered segments.
fn transport(segments: u32) -> MockFetcher {
    (1..=segments).fold(
        MockFetcher::new().with_body(INIT_URL, b"INIT-BLOCK".to_vec()),
        |mock, i| mock.with_body(format!("https://x/seg_{}", i), segment_body(i)),
    )
}

fn expected_output(segments: u32) -> Vec<u8> {
    let mut bytes = b"INIT-BLOCK".to_vec();
    for i in 1..=segments {
        bytes.extend(segment_body(i));
    }
    bytes
}

fn config(workers: usize) -> DownloadConfig {
    DownloadConfig::new()
        .with_placeholder("$N$")
        .with_workers(workers)
}

fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}

// ============================================================================
// Manifest Scenarios
// ============================================================================

#[test]
fn test_timeline_segment_count() {
    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(100, Some(0)), (200, Some(2))]);
    let manifest = ManifestDecoder::new().decode(&blob).unwrap();
    assert_eq!(manifest.segment_count(), 4);
}

#[test]
fn test_missing_template_is_invalid_without_fetches() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(5));
    let runner = JobRunner::new(fetcher.clone(), config(4));
    let blob = encode_manifest(Some(INIT_URL), None, &[(10, Some(4))]);

    let err = runner
        .run(&AssetDescriptor::new("t", temp.path().join("t.flac")), &blob)
        .unwrap_err();

    assert!(matches!(err, JobError::ManifestInvalid(_)));
    assert!(!err.is_retryable());
    assert_eq!(fetcher.request_count(), 0);
    assert!(dir_is_empty(temp.path()));
}

#[test]
fn test_default_placeholder_rejects_short_token() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(3));
    let runner = JobRunner::new(fetcher.clone(), DownloadConfig::new());
    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(2))]);

    let err = runner
        .run(&AssetDescriptor::new("p", temp.path().join("p.flac")), &blob)
        .unwrap_err();

    assert!(matches!(err, JobError::ManifestInvalid(_)));
    assert_eq!(fetcher.request_count(), 0);
}

#[test]
fn test_truncated_manifest_is_invalid_without_fetches() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(5));
    let runner = JobRunner::new(fetcher.clone(), config(4));
    let full = String::from_utf8(
        STANDARD
            .decode(encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(4))]))
            .unwrap(),
    )
    .unwrap();
    let cut = full.find("</Representation>").unwrap();
    let blob = STANDARD.encode(&full[..cut]);

    let err = runner
        .run(&AssetDescriptor::new("t", temp.path().join("t.flac")), &blob)
        .unwrap_err();

    assert!(matches!(err, JobError::ManifestInvalid(_)));
    assert_eq!(fetcher.request_count(), 0);
    assert!(dir_is_empty(temp.path()));
}

// ============================================================================
// End-to-End Scenarios
// ============================================================================

#[test]
fn test_end_to_end_five_segments() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(5));
    let reporter = Arc::new(CountingReporter::new());
    let runner = JobRunner::new(fetcher.clone(), config(4)).with_reporter(reporter.clone());
    let output = temp.path().join("track.flac");
    let asset = AssetDescriptor::new("track", &output);
    let mut job = DownloadJob::new("track", &output);

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(4))]);
    let report = runner.drive(&mut job, &asset, &blob).unwrap();

    let segment_requests: Vec<_> = fetcher
        .requests()
        .into_iter()
        .filter(|u| u.starts_with("https://x/seg_"))
        .collect();
    assert_eq!(segment_requests.len(), 5);
    for i in 1..=5 {
        assert!(fetcher.was_requested(&format!("https://x/seg_{}", i)));
    }

    assert_eq!(fs::read(&output).unwrap(), expected_output(5));
    assert_eq!(report.bytes_written, expected_output(5).len() as u64);
    assert_eq!(report.segment_count, 5);

    assert_eq!(reporter.completed(), 5);
    let completions: Vec<u32> = reporter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::SegmentCompleted { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    let mut sorted = completions.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3, 4, 5]);

    assert_eq!(job.state(), JobState::Completed);
    assert!(!job.workspace_dir().unwrap().exists());
}

#[test]
fn test_output_size_is_sum_of_units() {
    let temp = TempDir::new().unwrap();
    let runner = JobRunner::new(Arc::new(transport(12)), config(3));
    let output = temp.path().join("sized.flac");

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(5, Some(9)), (7, None), (3, Some(0))]);
    runner.run(&AssetDescriptor::new("sized", &output), &blob).unwrap();

    let expected: u64 = 10 + (1..=12).map(|i| segment_body(i).len() as u64).sum::<u64>();
    assert_eq!(fs::metadata(&output).unwrap().len(), expected);
}

#[test]
fn test_init_only_asset() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(0));
    let runner = JobRunner::new(fetcher.clone(), config(4));
    let output = temp.path().join("init-only.flac");

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[]);
    let report = runner.run(&AssetDescriptor::new("i", &output), &blob).unwrap();

    assert_eq!(report.segment_count, 0);
    assert_eq!(fetcher.request_count(), 1);
    assert_eq!(fs::read(&output).unwrap(), b"INIT-BLOCK");
}

// ============================================================================
// Failure Scenarios
// ============================================================================

#[test]
fn test_segment_failure_leaves_no_output_or_workspace() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(10).with_failure("https://x/seg_6", 503));
    let runner = JobRunner::new(fetcher, config(4));
    let output = temp.path().join("broken.flac");
    let asset = AssetDescriptor::new("broken", &output);
    let mut job = DownloadJob::new("broken", &output);

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(9))]);
    let err = runner.drive(&mut job, &asset, &blob).unwrap_err();

    match err {
        JobError::SegmentFetchFailed { failed, total, .. } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 11);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(job.state(), JobState::Failed);
    assert!(!output.exists());
    assert!(dir_is_empty(temp.path()));
}

#[test]
fn test_init_failure_fails_job() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(3).with_failure(INIT_URL, 403));
    let runner = JobRunner::new(fetcher, config(2));
    let output = temp.path().join("noinit.flac");

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(2))]);
    let err = runner.run(&AssetDescriptor::new("n", &output), &blob).unwrap_err();

    assert!(err.is_retryable());
    assert!(!output.exists());
    assert!(dir_is_empty(temp.path()));
}

#[test]
fn test_reassembly_failure_cleans_up() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(3));
    let runner = JobRunner::new(fetcher, config(2));
    let output = temp.path().join("out.flac");
    fs::create_dir(&output).unwrap();
    let asset = AssetDescriptor::new("out", &output);
    let mut job = DownloadJob::new("out", &output);

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(2))]);
    let err = runner.drive(&mut job, &asset, &blob).unwrap_err();

    assert!(matches!(err, JobError::ReassemblyFailed(_)));
    assert!(!err.is_retryable());
    assert_eq!(job.state(), JobState::Failed);
    assert!(job.history().contains(&JobState::Assembling));

    let workspace = job.workspace_dir().unwrap();
    assert!(!workspace.exists());
    assert!(output.is_dir());

    let leftovers: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["out.flac".to_string()]);
}

#[test]
fn test_workspace_failure_fetches_nothing() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("staging");
    fs::write(&blocker, b"not a directory").unwrap();

    let fetcher = Arc::new(transport(3));
    let runner = JobRunner::new(fetcher.clone(), config(2).with_staging_dir(&blocker));
    let output = temp.path().join("w.flac");
    let asset = AssetDescriptor::new("w", &output);
    let mut job = DownloadJob::new("w", &output);

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(2))]);
    let err = runner.drive(&mut job, &asset, &blob).unwrap_err();

    assert!(matches!(err, JobError::Workspace(_)));
    assert_eq!(err.kind(), "workspace");
    assert_eq!(fetcher.request_count(), 0);
    assert_eq!(job.state(), JobState::Failed);
    assert!(job.workspace_dir().is_none());
    assert!(!output.exists());
    assert!(blocker.is_file());
}

#[test]
fn test_failed_job_does_not_block_next_job() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(2));
    let runner = JobRunner::new(fetcher, config(2));

    let bad = runner.run(&AssetDescriptor::new("a", temp.path().join("a.flac")), "garbage!!");
    assert!(bad.is_err());

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(1))]);
    let good = runner.run(&AssetDescriptor::new("b", temp.path().join("b.flac")), &blob);
    assert!(good.is_ok());
}

// ============================================================================
// Concurrency Scenarios
// ============================================================================

#[test]
fn test_pool_size_does_not_change_output() {
    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(15))]);

    let outputs: Vec<Vec<u8>> = [1usize, 4]
        .iter()
        .map(|&workers| {
            let temp = TempDir::new().unwrap();
            let output = temp.path().join("pool.flac");
            let fetcher = transport(16).with_default_delay(Duration::from_millis(2));
            let runner = JobRunner::new(Arc::new(fetcher), config(workers));
            runner.run(&AssetDescriptor::new("pool", &output), &blob).unwrap();
            fs::read(&output).unwrap()
        })
        .collect();

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], expected_output(16));
}

#[test]
fn test_pool_never_exceeds_worker_count() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(transport(20).with_default_delay(Duration::from_millis(5)));
    let runner = JobRunner::new(fetcher.clone(), config(3));

    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(19))]);
    runner
        .run(&AssetDescriptor::new("bound", temp.path().join("b.flac")), &blob)
        .unwrap();

    assert!(fetcher.peak_in_flight() <= 3);
}

#[test]
fn test_shuffled_completion_order() {
    let segments = 12u32;
    let mut delays: Vec<u64> = (0..segments as u64).collect();
    delays.shuffle(&mut rand::rng());

    let fetcher = delays.iter().enumerate().fold(transport(segments), |mock, (i, ms)| {
        mock.with_delay(format!("https://x/seg_{}", i + 1), Duration::from_millis(*ms))
    });

    let temp = TempDir::new().unwrap();
    let output = temp.path().join("shuffled.flac");
    let runner = JobRunner::new(Arc::new(fetcher), config(6));
    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(segments - 1))]);

    runner.run(&AssetDescriptor::new("s", &output), &blob).unwrap();
    assert_eq!(fs::read(&output).unwrap(), expected_output(segments));
}

#[test]
fn test_concurrent_jobs_same_name_use_distinct_workspaces() {
    let temp = TempDir::new().unwrap();
    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(7))]);
    let fetcher = Arc::new(transport(8).with_default_delay(Duration::from_millis(3)));
    let runner = JobRunner::new(fetcher, config(2));

    let jobs: Vec<DownloadJob> = thread::scope(|scope| {
        let handles: Vec<_> = ["Same Song.flac", "Same Song (2).flac"]
            .iter()
            .map(|name| {
                let output = temp.path().join(name);
                let runner = &runner;
                let blob = blob.as_str();
                scope.spawn(move || {
                    let asset = AssetDescriptor::new("Same Song", &output);
                    let mut job = DownloadJob::new("Same Song", &output);
                    runner.drive(&mut job, &asset, blob).map(|_| job)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    let a = jobs[0].workspace_dir().unwrap();
    let b = jobs[1].workspace_dir().unwrap();
    assert_ne!(a, b);
    assert_eq!(a.parent(), b.parent());
    assert!(!a.exists() && !b.exists());
    for job in &jobs {
        assert_eq!(fs::read(job.final_path()).unwrap(), expected_output(8));
    }
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_segment_count_is_sum_of_repeats(
        entries in prop::collection::vec((1u64..10_000, prop::option::of(0u32..40)), 0..20)
    ) {
        let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &entries);
        let manifest = ManifestDecoder::new().decode(&blob).unwrap();

        let expected: u32 = entries.iter().map(|(_, r)| r.unwrap_or(0) + 1).sum();
        prop_assert_eq!(manifest.segment_count(), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_output_independent_of_completion_order(
        delays in prop::collection::vec(0u64..4, 1..10),
        workers in 1usize..5,
    ) {
        let segments = delays.len() as u32;
        let fetcher = delays.iter().enumerate().fold(transport(segments), |mock, (i, ms)| {
            mock.with_delay(format!("https://x/seg_{}", i + 1), Duration::from_millis(*ms))
        });

        let temp = TempDir::new().unwrap();
        let output = temp.path().join("prop.flac");
        let runner = JobRunner::new(Arc::new(fetcher), config(workers));
        let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(segments - 1))]);

        runner.run(&AssetDescriptor::new("p", &output), &blob).unwrap();
        prop_assert_eq!(fs::read(&output).unwrap(), expected_output(segments));
        prop_assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}

#[test]
fn test_random_failure_never_leaves_output() {
    let mut rng = rand::rng();
    let segments = 8u32;
    let failing = rng.random_range(1..=segments);

    let temp = TempDir::new().unwrap();
    let output = temp.path().join("rand.flac");
    let fetcher = transport(segments).with_failure(format!("https://x/seg_{}", failing), 500);
    let runner = JobRunner::new(Arc::new(fetcher), config(3));
    let blob = encode_manifest(Some(INIT_URL), Some(TEMPLATE), &[(10, Some(segments - 1))]);

    assert!(runner.run(&AssetDescriptor::new("r", &output), &blob).is_err());
    assert!(dir_is_empty(temp.path()));
}
