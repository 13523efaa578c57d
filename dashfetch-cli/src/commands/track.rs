//! Track command - resolve a track's manifest through the catalog API and
//! download it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashfetch::api::{AudioQuality, HttpPlaybackClient, PlaybackClient, TrackInfo};
use dashfetch::cover::fetch_cover_art;
use dashfetch::fetch::Session;
use dashfetch::job::{AssetDescriptor, JobRunner};
use dashfetch::naming::{album_dir_name, track_filename, volume_dir};
use dashfetch::tagging::FfmpegTagger;
use tracing::{debug, info};

use super::common::job_reporter;
use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};
use crate::ui;

/// Extension of downloaded tracks.
const TRACK_EXTENSION: &str = "flac";

/// Arguments for the track command.
pub struct TrackArgs {
    pub track_id: u64,
    pub quality: Option<String>,
    pub token: String,
    pub output_dir: Option<PathBuf>,
    pub track_json: Option<PathBuf>,
    pub tag: bool,
    pub workers: Option<usize>,
    pub no_progress: bool,
}

/// Run the track command.
pub fn run(global: &GlobalOptions, args: TrackArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("track");
    let settings = runner.config();

    let quality = match args.quality.as_deref() {
        Some(name) => name.parse::<AudioQuality>()?,
        None => settings.download.quality,
    };

    let track = args.track_json.as_deref().map(load_track).transpose()?;
    if let Some(track) = &track {
        if track.id != args.track_id {
            return Err(CliError::Config(format!(
                "track descriptor is for track {}, not {}",
                track.id, args.track_id
            )));
        }
    }

    let mut client = HttpPlaybackClient::new(Session::new(args.token.clone()))?
        .with_base_url(settings.api.base_url.clone());
    if let Some(cc) = &settings.api.country_code {
        client = client.with_country_code(cc.clone());
    }

    info!(track_id = args.track_id, quality = %quality, "Requesting playback info");
    let playback = client.playback_info(args.track_id, quality)?;
    debug!(
        mime = ?playback.manifest_mime_type,
        quality = ?playback.audio_quality,
        "Playback info received"
    );

    let output_dir = runner.output_dir(args.output_dir.as_deref());
    let output = output_path(&output_dir, args.track_id, track.as_ref());

    let config = runner.download_config(args.workers);
    let fetcher = runner.fetcher(&config, Some(&args.token))?;

    let mut asset = AssetDescriptor::new(args.track_id.to_string(), &output);
    let mut jobs = JobRunner::new(fetcher.clone(), config);

    if let Some(track) = track {
        if args.tag {
            let album_dir = output.parent().unwrap_or(output_dir.as_path()).to_path_buf();
            fs::create_dir_all(&album_dir)?;
            if let Some(cover) = track
                .cover_id()
                .and_then(|id| fetch_cover_art(fetcher.as_ref(), id, &album_dir))
            {
                asset = asset.with_cover(cover);
            }
            jobs = jobs.with_tagger(Arc::new(FfmpegTagger::new()));
        }
        asset = asset.with_track(track);
    } else if args.tag {
        println!("Tagging needs --track-json; the file will be left untagged.");
    }

    let (reporter, bar) = job_reporter(&asset.asset_id, !args.no_progress);
    let result = jobs.with_reporter(reporter).run(&asset, &playback.manifest);
    if let Some(bar) = bar {
        bar.clear();
    }

    let report = result?;
    ui::print_report(&report);
    Ok(())
}

/// Parse a track descriptor from a JSON file.
fn load_track(path: &Path) -> Result<TrackInfo, CliError> {
    let text = fs::read_to_string(path).map_err(|e| CliError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::Config(format!("invalid track descriptor {}: {}", path.display(), e)))
}

/// Where a track lands: `<album dir>/[Volume n/]<track file>` when the
/// descriptor is known, `<id>.flac` otherwise.
fn output_path(output_dir: &Path, track_id: u64, track: Option<&TrackInfo>) -> PathBuf {
    match track {
        Some(track) => {
            let album = output_dir.join(album_dir_name(track));
            let volume = track.volume_number();
            volume_dir(&album, volume, volume > 1).join(track_filename(track, TRACK_EXTENSION))
        }
        None => output_dir.join(format!("{}.{}", track_id, TRACK_EXTENSION)),
    }
}
