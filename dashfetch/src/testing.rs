//! In-memory test doubles.
//!
//! [`MockFetcher`] serves canned bodies per URL so the coordinator and job
//! runner can be exercised without a network. It records every request and
//! the peak number of concurrent fetches it observed.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::fetch::{FetchError, FetchResult, SegmentFetcher};

/// Scripted [`SegmentFetcher`].
///
/// URLs without a configured body answer with HTTP 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    failures: HashMap<String, u16>,
    delays: HashMap<String, Duration>,
    panics: HashSet<String>,
    default_delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockFetcher {
    /// Create a fetcher with no configured URLs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// Answer `url` with a non-success status.
    pub fn with_failure(mut self, url: impl Into<String>, status: u16) -> Self {
        self.failures.insert(url.into(), status);
        self
    }

    /// Sleep before answering `url`.
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    /// Sleep before answering any URL without its own delay.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Panic while fetching `url`.
    pub fn with_panic(mut self, url: impl Into<String>) -> Self {
        self.panics.insert(url.into());
        self
    }

    /// Every requested URL in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of fetch calls made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Whether `url` was requested at least once.
    pub fn was_requested(&self, url: &str) -> bool {
        self.requests.lock().iter().any(|r| r == url)
    }

    /// Highest number of fetches observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, url: &str, dest: &Path) -> FetchResult<u64> {
        if let Some(delay) = self.delays.get(url).copied().or(self.default_delay) {
            thread::sleep(delay);
        }

        if self.panics.contains(url) {
            panic!("scripted panic for {}", url);
        }

        if let Some(&status) = self.failures.get(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = self.bodies.get(url).ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })?;

        fs::write(dest, body).map_err(|e| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok(body.len() as u64)
    }
}

impl SegmentFetcher for MockFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> FetchResult<u64> {
        self.requests.lock().push(url.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        self.answer(url, dest)
    }
}

/// Decrements the in-flight counter even when the fetch panics.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mock_serves_body() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a");
        let mock = MockFetcher::new().with_body("u", b"abc".to_vec());

        assert_eq!(mock.fetch("u", &dest).unwrap(), 3);
        assert_eq!(fs::read(&dest).unwrap(), b"abc");
        assert!(mock.was_requested("u"));
    }

    #[test]
    fn test_mock_unknown_url_is_not_found() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a");
        let mock = MockFetcher::new();

        let err = mock.fetch("missing", &dest).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(!dest.exists());
        assert_eq!(mock.peak_in_flight(), 1);
    }
}
