//! Segment-addressing manifests.
//!
//! A manifest arrives as a base64 envelope around an MPEG-DASH document. Only
//! the parts needed to address the media are kept:
//!
//! - the initialization block URL
//! - the per-segment URL template
//! - the number of numbered segments, derived from the segment timeline
//!
//! # Example
//!
//! ```ignore
//! use dashfetch::manifest::ManifestDecoder;
//!
//! let manifest = ManifestDecoder::new().decode(&encoded)?;
//! for (index, url) in manifest.segment_urls("$Number$") {
//!     println!("{index}: {url}");
//! }
//! ```

mod decoder;
mod error;

pub use decoder::{segment_count, ManifestDecoder, TimelineEntry, DASH_NAMESPACE, MAX_SEGMENTS};
pub use error::{ManifestError, ManifestResult};

/// Placeholder token used by DASH `SegmentTemplate@media` for the segment number.
pub const DEFAULT_PLACEHOLDER: &str = "$Number$";

/// Decoded addressing information for one media asset.
///
/// Immutable once decoded. Segment indices are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    init_url: String,
    media_template: String,
    segment_count: u32,
}

impl Manifest {
    /// Create a manifest from its parts.
    pub fn new(
        init_url: impl Into<String>,
        media_template: impl Into<String>,
        segment_count: u32,
    ) -> Self {
        Self {
            init_url: init_url.into(),
            media_template: media_template.into(),
            segment_count,
        }
    }

    /// URL of the initialization block.
    pub fn init_url(&self) -> &str {
        &self.init_url
    }

    /// Per-segment URL template.
    pub fn media_template(&self) -> &str {
        &self.media_template
    }

    /// Number of numbered segments. Zero for an init-only asset.
    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    /// Substitute a 1-based segment index into the media template.
    pub fn segment_url(&self, placeholder: &str, index: u32) -> String {
        self.media_template
            .replacen(placeholder, &index.to_string(), 1)
    }

    /// All segment URLs in ascending index order.
    pub fn segment_urls<'a>(
        &'a self,
        placeholder: &'a str,
    ) -> impl Iterator<Item = (u32, String)> + 'a {
        (1..=self.segment_count).map(move |index| (index, self.segment_url(placeholder, index)))
    }

    /// Check that the template can address numbered segments.
    ///
    /// An init-only manifest never substitutes, so any template is accepted.
    pub fn validate_template(&self, placeholder: &str) -> ManifestResult<()> {
        if self.segment_count == 0 {
            return Ok(());
        }
        match self.media_template.matches(placeholder).count() {
            1 => Ok(()),
            found => Err(ManifestError::Placeholder {
                placeholder: placeholder.to_string(),
                found,
            }),
        }
    }
}
