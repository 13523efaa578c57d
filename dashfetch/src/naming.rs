//! Output file and directory naming.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::api::{Artist, TrackInfo};

/// Artist lists longer than this are shown as `Various` in file names.
const MAX_FILENAME_ARTISTS: usize = 4;

/// Replace characters that are invalid in file names with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect()
}

/// Display name for a list of artist credits.
///
/// Uses main credits when there are any, otherwise every credit.
pub fn artist_display_name(artists: &[Artist], for_filename: bool) -> String {
    if artists.is_empty() {
        return "Unknown".to_string();
    }

    let mut names: Vec<&str> = artists
        .iter()
        .filter(|a| a.is_main())
        .map(Artist::display_name)
        .collect();
    if names.is_empty() {
        names = artists.iter().map(Artist::display_name).collect();
    }

    if for_filename && names.len() > MAX_FILENAME_ARTISTS {
        return "Various".to_string();
    }

    match names.as_slice() {
        [one] => one.to_string(),
        [a, b] => format!("{} & {}", a, b),
        _ => names.join(", "),
    }
}

fn featuring_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\s*\(feat\.\s*[^)]+\)",
            r"(?i)\s*\(ft\.\s*[^)]+\)",
            r"(?i)\s*feat\.\s*[^)]+",
            r"(?i)\s*ft\.\s*[^)]+",
            r"(?i)\s*\(with\s+[^)]+\)",
            r"(?i)\s*with\s+[^)]+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn featured_name(fragment: &str) -> String {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| Regex::new(r"(?i)^[^(]*\(?\s*(?:feat\.|ft\.|with)\s*").ok());
    let name = match prefix {
        Some(re) => re.replace(fragment, "").into_owned(),
        None => fragment.to_string(),
    };
    name.trim().trim_end_matches(')').trim().to_lowercase()
}

/// Drop featuring credits from a title when the featured artist is already
/// credited on the track.
pub fn clean_track_title(title: &str, artists: &[Artist]) -> String {
    if title.is_empty() || artists.is_empty() {
        return title.to_string();
    }

    let credited: Vec<String> = artists
        .iter()
        .filter_map(|a| a.name.as_deref())
        .map(str::to_lowercase)
        .collect();

    let mut cleaned = title.to_string();
    for pattern in featuring_patterns() {
        let fragments: Vec<String> = pattern
            .find_iter(&cleaned)
            .map(|m| m.as_str().to_string())
            .collect();
        for fragment in fragments {
            if credited.contains(&featured_name(&fragment)) {
                cleaned = cleaned.replace(&fragment, "").trim().to_string();
            }
        }
    }
    cleaned
}

/// File name for a track: `NN. Artists - Title[ (Version)].ext`.
pub fn track_filename(track: &TrackInfo, extension: &str) -> String {
    let title = clean_track_title(track.title(), &track.artists);
    let artists = artist_display_name(&track.artists, true);
    let name = match track.version.as_deref().filter(|v| !v.is_empty()) {
        Some(version) => format!(
            "{:02}. {} - {} ({}).{}",
            track.track_number(),
            artists,
            title,
            version,
            extension
        ),
        None => format!(
            "{:02}. {} - {}.{}",
            track.track_number(),
            artists,
            title,
            extension
        ),
    };
    sanitize_filename(&name)
}

/// Directory name for a track's album: `Artists - Album`.
pub fn album_dir_name(track: &TrackInfo) -> String {
    sanitize_filename(&format!(
        "{} - {}",
        artist_display_name(&track.artists, true),
        track.album_title()
    ))
}

/// Target directory for a track, with a `Volume N` subfolder for
/// multi-volume albums.
pub fn volume_dir(album_dir: &Path, volume: u32, multi_volume: bool) -> PathBuf {
    if multi_volume {
        album_dir.join(format!("Volume {}", volume))
    } else {
        album_dir.to_path_buf()
    }
}
