//! dashfetch - segmented DASH media downloader
//!
//! This library fetches a media asset delivered as an initialization block
//! plus numbered segments, described by a base64-wrapped DASH manifest, and
//! reassembles it into one file.
//!
//! # Pipeline
//!
//! ```text
//! manifest blob ──► ManifestDecoder ──► Manifest
//!                                          │
//!                  WorkspaceManager ──► Workspace (temp_<asset>_<random>)
//!                                          │
//!          DownloadCoordinator (W workers, SegmentFetcher) ──► ProgressReporter
//!                                          │
//!                    Reassembler (init + segments by index) ──► output file
//! ```
//!
//! [`job::JobRunner`] drives the whole pipeline and guarantees the workspace
//! is removed on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dashfetch::config::DownloadConfig;
//! use dashfetch::fetch::HttpFetcher;
//! use dashfetch::job::{AssetDescriptor, JobRunner};
//!
//! let runner = JobRunner::new(Arc::new(HttpFetcher::new()?), DownloadConfig::default());
//! let report = runner.run(&AssetDescriptor::new("12345", "out.flac"), &manifest_blob)?;
//! println!("{} bytes", report.bytes_written);
//! ```

pub mod api;
pub mod config;
pub mod coordinator;
pub mod cover;
pub mod fetch;
pub mod job;
pub mod logging;
pub mod manifest;
pub mod naming;
pub mod progress;
pub mod reassemble;
pub mod tagging;
pub mod testing;
pub mod workspace;

pub use coordinator::{DownloadCoordinator, FetchPlan, FetchReport};
pub use fetch::{FetchError, HttpFetcher, SegmentFetcher, Session};
pub use job::{AssetDescriptor, DownloadJob, JobError, JobReport, JobRunner, JobState};
pub use manifest::{Manifest, ManifestDecoder, ManifestError};
pub use progress::{CountingReporter, NoopReporter, ProgressEvent, ProgressReporter};
pub use reassemble::{AssemblyPlan, Reassembler, ReassemblyError};
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};
