//! Album cover art.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::fetch::SegmentFetcher;

/// Default cover image size.
pub const DEFAULT_COVER_SIZE: &str = "1280x1280";

/// File name the cover is stored under.
pub const COVER_FILENAME: &str = "cover.jpg";

/// Image URL for a dash-separated cover id.
pub fn cover_art_url(cover_id: &str, size: &str) -> String {
    format!(
        "https://resources.tidal.com/images/{}/{}.jpg",
        cover_id.replace('-', "/"),
        size
    )
}

/// Fetch the cover into `dir/cover.jpg`.
///
/// Returns `None` on failure; a missing cover never fails a download.
pub fn fetch_cover_art(fetcher: &dyn SegmentFetcher, cover_id: &str, dir: &Path) -> Option<PathBuf> {
    fetch_cover_art_from(fetcher, &cover_art_url(cover_id, DEFAULT_COVER_SIZE), dir)
}

/// Fetch a cover from an explicit URL into `dir/cover.jpg`.
pub fn fetch_cover_art_from(fetcher: &dyn SegmentFetcher, url: &str, dir: &Path) -> Option<PathBuf> {
    let dest = dir.join(COVER_FILENAME);
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "Could not create cover directory");
        return None;
    }
    match fetcher.fetch(url, &dest) {
        Ok(bytes) => {
            debug!(path = %dest.display(), bytes, "Fetched cover art");
            Some(dest)
        }
        Err(e) => {
            warn!(url, error = %e, "Could not fetch cover art");
            None
        }
    }
}
