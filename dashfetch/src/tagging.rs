//! Metadata tagging of finished files.
//!
//! Tagging runs after reassembly and is never fatal to a job: the runner logs
//! a [`TagError`] and keeps the untagged file.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::api::TrackInfo;
use crate::naming::artist_display_name;

/// Errors from a tagging run.
#[derive(Debug, Error)]
pub enum TagError {
    /// The tagging program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The tagging program exited unsuccessfully.
    #[error("{program} failed: {stderr}")]
    Failed { program: String, stderr: String },

    /// The tagged file could not replace the original.
    #[error("failed to replace {}: {source}", path.display())]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Tag values for one track. Empty values are never written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub album_artist: String,
    pub track: String,
    pub date: String,
    pub genre: String,
    pub isrc: String,
    pub copyright: String,
    pub version: String,
}

impl TrackTags {
    /// Derive tags from a track descriptor.
    pub fn from_track(track: &TrackInfo) -> Self {
        let album = track
            .album
            .as_ref()
            .and_then(|a| a.title.clone())
            .unwrap_or_default();

        Self {
            title: track.title.clone().unwrap_or_default(),
            album,
            artist: artist_display_name(&track.artists, false),
            album_artist: track
                .artists
                .first()
                .and_then(|a| a.name.clone())
                .unwrap_or_default(),
            track: track.track_number().to_string(),
            date: track.release_year().unwrap_or_default().to_string(),
            genre: track.genre_list(),
            isrc: track.isrc.clone().unwrap_or_default(),
            copyright: track.copyright.clone().unwrap_or_default(),
            version: track.version.clone().unwrap_or_default(),
        }
    }

    /// Non-empty `(key, value)` pairs in a stable order.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("title", self.title.as_str()),
            ("album", self.album.as_str()),
            ("artist", self.artist.as_str()),
            ("album_artist", self.album_artist.as_str()),
            ("track", self.track.as_str()),
            ("date", self.date.as_str()),
            ("genre", self.genre.as_str()),
            ("isrc", self.isrc.as_str()),
            ("copyright", self.copyright.as_str()),
            ("version", self.version.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }
}

/// Writes tags into a finished file in place.
pub trait MetadataTagger: Send + Sync {
    fn tag(&self, path: &Path, tags: &TrackTags, cover: Option<&Path>) -> Result<(), TagError>;
}

/// Tagger that leaves files untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTagger;

impl MetadataTagger for NoopTagger {
    fn tag(&self, _path: &Path, _tags: &TrackTags, _cover: Option<&Path>) -> Result<(), TagError> {
        Ok(())
    }
}

/// Tagger that remuxes through `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegTagger {
    program: PathBuf,
}

impl Default for FfmpegTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegTagger {
    /// Use `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Temporary output path; keeps the extension so ffmpeg picks the muxer.
    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(".temp.");
        name.push(path.extension().unwrap_or_else(|| OsStr::new("flac")));
        path.with_file_name(name)
    }

    fn args(input: &Path, tags: &TrackTags, cover: Option<&Path>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];

        if let Some(cover) = cover {
            args.extend([
                OsString::from("-i"),
                cover.into(),
                "-map".into(),
                "0:0".into(),
                "-map".into(),
                "1:0".into(),
                "-disposition:v".into(),
                "attached_pic".into(),
                "-id3v2_version".into(),
                "3".into(),
            ]);
        }

        for (key, value) in tags.pairs() {
            args.push("-metadata".into());
            args.push(format!("{}={}", key, value).into());
        }

        args.extend([OsString::from("-c"), "copy".into(), output.into()]);
        args
    }
}

impl MetadataTagger for FfmpegTagger {
    fn tag(&self, path: &Path, tags: &TrackTags, cover: Option<&Path>) -> Result<(), TagError> {
        let program = self.program.display().to_string();
        let temp = Self::temp_path(path);
        let cover = cover.filter(|c| c.exists());

        let output = Command::new(&self.program)
            .args(Self::args(path, tags, cover, &temp))
            .output()
            .map_err(|e| TagError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            fs::remove_file(&temp).ok();
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TagError::Failed {
                program,
                stderr: stderr.trim().to_string(),
            });
        }

        fs::rename(&temp, path).map_err(|e| {
            fs::remove_file(&temp).ok();
            TagError::Replace {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        debug!(path = %path.display(), "Tagged file");
        Ok(())
    }
}
