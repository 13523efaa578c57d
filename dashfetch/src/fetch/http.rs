//! Blocking HTTP fetcher.
//!
//! Streams the response body to a `.part` sibling of the destination and
//! renames it into place only once the whole body has been written.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::debug;

use super::error::{FetchError, FetchResult};
use super::session::Session;
use super::{partial_path, SegmentFetcher};

/// Default timeout for a single unit request in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// HTTP GET fetcher backed by a blocking reqwest client.
///
/// The client is shared by all pool workers; reqwest clients are internally
/// reference counted and safe to use from several threads.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    session: Option<Session>,
    pub(crate) timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            session: None,
            timeout,
        })
    }

    /// Send the session credentials with every request.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send(&self, url: &str) -> FetchResult<Response> {
        let mut request = self.client.get(url);
        if let Some(session) = &self.session {
            request = session.apply(request);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// Stream the response body to `path`.
    fn stream_body(&self, url: &str, mut response: Response, path: &Path) -> FetchResult<u64> {
        let file = File::create(path).map_err(|e| FetchError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let bytes_read = response.read(&mut buffer).map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    FetchError::Timeout {
                        url: url.to_string(),
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    FetchError::Transport {
                        url: url.to_string(),
                        reason: format!("Read error: {}", e),
                    }
                }
            })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| FetchError::Write {
                    path: path.to_path_buf(),
                    source: e,
                })?;

            written += bytes_read as u64;
        }

        writer.flush().map_err(|e| FetchError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(written)
    }
}

impl SegmentFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> FetchResult<u64> {
        let partial = partial_path(dest);

        let result = self
            .send(url)
            .and_then(|response| self.stream_body(url, response, &partial))
            .and_then(|written| {
                fs::rename(&partial, dest)
                    .map(|_| written)
                    .map_err(|e| FetchError::Write {
                        path: dest.to_path_buf(),
                        source: e,
                    })
            });

        match result {
            Ok(written) => {
                debug!(url, bytes = written, "Fetched unit");
                Ok(written)
            }
            Err(e) => {
                fs::remove_file(&partial).ok();
                fs::remove_file(dest).ok();
                Err(e)
            }
        }
    }
}
