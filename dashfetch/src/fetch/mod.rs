//! Fetching of single addressable units.
//!
//! A unit is either the initialization block or one numbered segment. The
//! [`SegmentFetcher`] trait is the seam between the coordinator and the
//! network, which lets tests drive the whole pipeline with an in-memory
//! transport.
//!
//! Fetchers never retry. One failure is reported as one failure and the
//! coordinator decides what it means for the job.

mod error;
mod http;
mod session;

pub use error::{FetchError, FetchResult};
pub use http::{HttpFetcher, DEFAULT_TIMEOUT_SECS};
pub use session::Session;

use std::path::{Path, PathBuf};

/// Trait for fetching one unit into a local file.
///
/// Implementations must leave no file at `dest` when they return an error,
/// so a failed fetch can never be mistaken for a completed one.
pub trait SegmentFetcher: Send + Sync {
    /// Fetch `url` and write the complete body to `dest`.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> FetchResult<u64>;
}

impl<T: SegmentFetcher + ?Sized> SegmentFetcher for std::sync::Arc<T> {
    fn fetch(&self, url: &str, dest: &Path) -> FetchResult<u64> {
        (**self).fetch(url, dest)
    }
}

/// Sibling path used while a body is still being written.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
