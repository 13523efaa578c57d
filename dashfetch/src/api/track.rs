//! Track descriptor schema.
//!
//! Every field except `id` is optional on the wire. Accessors supply the
//! defaults used for naming and tagging.

use serde::{Deserialize, Serialize};

/// One artist credit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub name: Option<String>,
    /// Credit role, e.g. `MAIN` or `FEATURED`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl Artist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Name, or `Unknown` when absent.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Main credits are typed `MAIN` or untyped.
    pub fn is_main(&self) -> bool {
        matches!(self.kind.as_deref(), None | Some("MAIN"))
    }
}

/// The album a track belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRef {
    #[serde(default)]
    pub title: Option<String>,
    /// ISO date, `YYYY-MM-DD`.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Cover image id, dash separated.
    #[serde(default)]
    pub cover: Option<String>,
}

/// A genre, either a bare name or an object with a `name` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Genre {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl Genre {
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            Self::Name(name) => Some(name.as_str()),
            Self::Object { name } => name.as_deref(),
        };
        name.filter(|n| !n.is_empty())
    }
}

/// Descriptor of one track as returned by the catalog API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub volume_number: Option<u32>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl TrackInfo {
    /// Create a descriptor with only an id.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Title")
    }

    pub fn album_title(&self) -> &str {
        self.album
            .as_ref()
            .and_then(|a| a.title.as_deref())
            .unwrap_or("Unknown Album")
    }

    pub fn track_number(&self) -> u32 {
        self.track_number.unwrap_or(1)
    }

    pub fn volume_number(&self) -> u32 {
        self.volume_number.unwrap_or(1)
    }

    /// Cover image id of the album, if any.
    pub fn cover_id(&self) -> Option<&str> {
        self.album
            .as_ref()
            .and_then(|a| a.cover.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Release year taken from the album release date.
    pub fn release_year(&self) -> Option<&str> {
        self.album
            .as_ref()
            .and_then(|a| a.release_date.as_deref())
            .and_then(|d| d.split('-').next())
            .filter(|y| !y.is_empty())
    }

    /// Genre names joined with `"; "`.
    pub fn genre_list(&self) -> String {
        self.genres
            .iter()
            .filter_map(Genre::name)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_track() {
        let json = r#"{
            "id": 77,
            "title": "Song",
            "version": "Remastered",
            "trackNumber": 3,
            "volumeNumber": 2,
            "artists": [{"name": "A", "type": "MAIN"}, {"name": "B", "type": "FEATURED"}],
            "album": {"title": "Record", "releaseDate": "2019-05-01", "cover": "ab-cd"},
            "isrc": "X1",
            "genres": [{"name": "Jazz"}, "Blues"]
        }"#;

        let track: TrackInfo = serde_json::from_str(json).unwrap();
        assert_eq!(track.id, 77);
        assert_eq!(track.track_number(), 3);
        assert_eq!(track.volume_number(), 2);
        assert!(track.artists[0].is_main());
        assert!(!track.artists[1].is_main());
        assert_eq!(track.cover_id(), Some("ab-cd"));
        assert_eq!(track.release_year(), Some("2019"));
        assert_eq!(track.genre_list(), "Jazz; Blues");
    }

    #[test]
    fn test_deserialize_minimal_track_uses_defaults() {
        let track: TrackInfo = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(track.title(), "Unknown Title");
        assert_eq!(track.album_title(), "Unknown Album");
        assert_eq!(track.track_number(), 1);
        assert!(track.cover_id().is_none());
        assert!(track.release_year().is_none());
        assert_eq!(track.genre_list(), "");
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert!(serde_json::from_str::<TrackInfo>(r#"{"title": "x"}"#).is_err());
    }
}
