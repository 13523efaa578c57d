//! Manifest source.
//!
//! The catalog API hands out the encoded manifest for a track through its
//! playback-info endpoint. The core only needs the manifest blob; the rest of
//! the response is kept for display.

mod track;

pub use track::{AlbumRef, Artist, Genre, TrackInfo};

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::fetch::Session;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.tidal.com";

/// Default timeout for API calls in seconds.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Errors from the catalog API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The request did not complete.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body was not the expected JSON.
    #[error("invalid playback info response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response carried no manifest.
    #[error("no manifest in playback info for track {track_id}")]
    MissingManifest { track_id: u64 },

    /// Unrecognized audio quality name.
    #[error("unknown audio quality '{0}'")]
    UnknownQuality(String),
}

/// Requested audio quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AudioQuality {
    Low,
    High,
    Lossless,
    #[default]
    HiResLossless,
}

impl AudioQuality {
    /// Name used on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
            Self::Lossless => "LOSSLESS",
            Self::HiResLossless => "HI_RES_LOSSLESS",
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for AudioQuality {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "LOW" => Ok(Self::Low),
            "HIGH" => Ok(Self::High),
            "LOSSLESS" => Ok(Self::Lossless),
            "HI_RES_LOSSLESS" | "HIRES_LOSSLESS" | "HIRES" | "HI_RES" => Ok(Self::HiResLossless),
            _ => Err(ApiError::UnknownQuality(s.to_string())),
        }
    }
}

/// Playback info for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackInfo {
    pub track_id: u64,
    pub audio_quality: Option<String>,
    pub manifest_mime_type: Option<String>,
    /// Base64 manifest envelope.
    pub manifest: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackInfoWire {
    #[serde(default)]
    track_id: Option<u64>,
    #[serde(default)]
    audio_quality: Option<String>,
    #[serde(default)]
    manifest_mime_type: Option<String>,
    #[serde(default)]
    manifest: Option<String>,
}

impl PlaybackInfo {
    /// Parse a playback-info response body.
    pub fn from_json(track_id: u64, body: &str) -> Result<Self, ApiError> {
        let wire: PlaybackInfoWire = serde_json::from_str(body)?;
        let manifest = wire
            .manifest
            .filter(|m| !m.is_empty())
            .ok_or(ApiError::MissingManifest { track_id })?;

        Ok(Self {
            track_id: wire.track_id.unwrap_or(track_id),
            audio_quality: wire.audio_quality,
            manifest_mime_type: wire.manifest_mime_type,
            manifest,
        })
    }
}

/// Source of manifests for tracks.
pub trait PlaybackClient: Send + Sync {
    /// Fetch playback info, including the encoded manifest, for a track.
    fn playback_info(&self, track_id: u64, quality: AudioQuality) -> Result<PlaybackInfo, ApiError>;
}

/// Playback client backed by the HTTP catalog API.
#[derive(Debug)]
pub struct HttpPlaybackClient {
    client: Client,
    session: Session,
    base_url: String,
    country_code: Option<String>,
}

impl HttpPlaybackClient {
    /// Create a client against the default base URL.
    pub fn new(session: Session) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_API_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            session,
            base_url: DEFAULT_BASE_URL.to_string(),
            country_code: None,
        })
    }

    /// Use a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a country code with every request.
    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    /// URL of the playback-info endpoint for a track.
    pub fn playback_url(&self, track_id: u64) -> String {
        format!("{}/v1/tracks/{}/playbackinfo", self.base_url, track_id)
    }
}

impl PlaybackClient for HttpPlaybackClient {
    fn playback_info(&self, track_id: u64, quality: AudioQuality) -> Result<PlaybackInfo, ApiError> {
        let url = self.playback_url(track_id);
        let mut query = vec![
            ("playbackmode", "STREAM".to_string()),
            ("assetpresentation", "FULL".to_string()),
            ("audioquality", quality.as_wire().to_string()),
        ];
        if let Some(cc) = &self.country_code {
            query.push(("countryCode", cc.clone()));
        }

        let session_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        debug!(track_id, quality = %quality, "Requesting playback info");

        let request = self
            .session
            .apply(self.client.get(&url))
            .query(&query)
            .header(
                "x-tidal-streamingsessionid",
                format!("download-session-{}", session_id),
            );

        let response = request.send().map_err(|e| ApiError::Request {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|e| ApiError::Request {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        PlaybackInfo::from_json(track_id, &body)
    }
}
