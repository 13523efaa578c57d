//! Decoding of base64-wrapped DASH manifests.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use tracing::debug;

use super::error::{ManifestError, ManifestResult};
use super::Manifest;

/// XML namespace of MPEG-DASH MPD documents.
pub const DASH_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";

/// Shortest envelope worth decoding. Anything shorter cannot hold an MPD.
const MIN_ENVELOPE_LEN: usize = 10;

/// Upper bound on the number of segments a manifest may declare.
///
/// A full-length track at typical segment durations stays far below this.
pub const MAX_SEGMENTS: u32 = 100_000;

const SEGMENT_TEMPLATE: &[u8] = b"SegmentTemplate";
const SEGMENT_TIMELINE: &[u8] = b"SegmentTimeline";
const TIMELINE_ENTRY: &[u8] = b"S";

/// One `<S>` entry of a segment timeline.
///
/// Describes a segment of `duration` timescale units, followed by `repeat`
/// more segments of the same duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub duration: u64,
    pub repeat: u32,
}

impl TimelineEntry {
    /// Create a timeline entry.
    pub fn new(duration: u64, repeat: u32) -> Self {
        Self { duration, repeat }
    }

    /// Number of segments this entry stands for.
    pub fn segments(&self) -> u64 {
        u64::from(self.repeat) + 1
    }
}

/// Total number of segments described by a timeline.
pub fn segment_count(entries: &[TimelineEntry]) -> u64 {
    entries.iter().map(TimelineEntry::segments).sum()
}

/// Decoder for the manifest envelope.
#[derive(Debug, Default, Clone)]
pub struct ManifestDecoder;

impl ManifestDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decode a base64 envelope into a [`Manifest`].
    ///
    /// Whitespace inside the envelope (line-wrapped base64) is ignored.
    pub fn decode(&self, encoded: &str) -> ManifestResult<Manifest> {
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        if compact.len() < MIN_ENVELOPE_LEN {
            return Err(ManifestError::TooShort { len: compact.len() });
        }

        let bytes = BASE64.decode(compact.as_bytes())?;
        let document = String::from_utf8(bytes)?;
        self.parse_document(&document)
    }

    /// Parse an already-unwrapped MPD document.
    pub fn parse_document(&self, document: &str) -> ManifestResult<Manifest> {
        let mut reader = NsReader::from_str(document);
        reader.config_mut().trim_text(true);

        let mut scan = Scan::default();
        let mut depth = 0usize;
        let mut root_seen = false;

        loop {
            let (namespace, event) = reader.read_resolved_event()?;
            let in_dash = in_dash_namespace(&namespace);

            match event {
                Event::Start(element) => {
                    check_root(depth, &mut root_seen)?;
                    depth += 1;
                    scan.visit(&element, in_dash, depth, false)?;
                }
                Event::Empty(element) => {
                    check_root(depth, &mut root_seen)?;
                    scan.visit(&element, in_dash, depth + 1, true)?;
                }
                Event::End(_) => {
                    scan.close(depth);
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth != 0 {
            return Err(ManifestError::Malformed(format!(
                "unexpected end of document with {depth} unclosed element(s)"
            )));
        }
        if !root_seen {
            return Err(ManifestError::Malformed(
                "document has no root element".to_string(),
            ));
        }

        let template = scan.template.ok_or(ManifestError::MissingDescriptor)?;
        let init_url = template
            .init
            .ok_or(ManifestError::MissingAttribute("initialization"))?;
        let media_template = template
            .media
            .ok_or(ManifestError::MissingAttribute("media"))?;

        let total = template.timeline.as_deref().map(segment_count).unwrap_or(0);
        if total > u64::from(MAX_SEGMENTS) {
            return Err(ManifestError::TooManySegments {
                count: total,
                max: MAX_SEGMENTS,
            });
        }
        let segment_count = u32::try_from(total).map_err(|_| ManifestError::TooManySegments {
            count: total,
            max: MAX_SEGMENTS,
        })?;

        debug!(
            segment_count,
            timeline = template.timeline.is_some(),
            "Decoded manifest"
        );

        Ok(Manifest::new(init_url, media_template, segment_count))
    }
}

/// Attributes collected from the first segment template.
#[derive(Debug, Default)]
struct Template {
    init: Option<String>,
    media: Option<String>,
    timeline: Option<Vec<TimelineEntry>>,
}

/// Element-walk state while scanning the document.
#[derive(Debug, Default)]
struct Scan {
    template: Option<Template>,
    template_depth: Option<usize>,
    timeline_depth: Option<usize>,
}

impl Scan {
    fn visit(
        &mut self,
        element: &BytesStart<'_>,
        in_dash: bool,
        depth: usize,
        empty: bool,
    ) -> ManifestResult<()> {
        if !in_dash {
            return Ok(());
        }
        let name = element.local_name();

        if self.template.is_none() && name.as_ref() == SEGMENT_TEMPLATE {
            self.template = Some(Template {
                init: attribute(element, "initialization")?,
                media: attribute(element, "media")?,
                timeline: None,
            });
            if !empty {
                self.template_depth = Some(depth);
            }
            return Ok(());
        }

        let Some(template) = self.template.as_mut() else {
            return Ok(());
        };

        if self.template_depth == Some(depth - 1)
            && template.timeline.is_none()
            && name.as_ref() == SEGMENT_TIMELINE
        {
            template.timeline = Some(Vec::new());
            if !empty {
                self.timeline_depth = Some(depth);
            }
        } else if self.timeline_depth == Some(depth - 1) && name.as_ref() == TIMELINE_ENTRY {
            let duration = numeric(element, "d")?.unwrap_or(0);
            let repeat = numeric(element, "r")?.unwrap_or(0);
            if let Some(entries) = template.timeline.as_mut() {
                entries.push(TimelineEntry::new(duration, repeat));
            }
        }

        Ok(())
    }

    fn close(&mut self, depth: usize) {
        if self.timeline_depth == Some(depth) {
            self.timeline_depth = None;
        }
        if self.template_depth == Some(depth) {
            self.template_depth = None;
        }
    }
}

/// A start tag at depth zero opens the root; a second one is an error.
fn check_root(depth: usize, root_seen: &mut bool) -> ManifestResult<()> {
    if depth > 0 {
        return Ok(());
    }
    if *root_seen {
        return Err(ManifestError::Malformed(
            "multiple root elements".to_string(),
        ));
    }
    *root_seen = true;
    Ok(())
}

/// Elements count as DASH elements in the MPD namespace or in no namespace.
fn in_dash_namespace(namespace: &ResolveResult<'_>) -> bool {
    match namespace {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(uri)) => *uri == DASH_NAMESPACE.as_bytes(),
        ResolveResult::Unknown(_) => false,
    }
}

/// Read a non-empty, unescaped attribute value.
fn attribute(element: &BytesStart<'_>, name: &str) -> ManifestResult<Option<String>> {
    let Some(attr) = element.try_get_attribute(name)? else {
        return Ok(None);
    };
    let value: Cow<'_, str> = attr.unescape_value()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn numeric<T: std::str::FromStr>(
    element: &BytesStart<'_>,
    name: &'static str,
) -> ManifestResult<Option<T>> {
    attribute(element, name)?
        .map(|raw| {
            raw.parse::<T>().map_err(|_| ManifestError::InvalidAttribute {
                attribute: name,
                value: raw,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(document: &str) -> String {
        BASE64.encode(document.as_bytes())
    }

    const NAMESPACED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" profiles="urn:mpeg:dash:profile:isoff-main:2011" type="static">
  <Period id="0">
    <AdaptationSet id="0" contentType="audio" mimeType="audio/mp4">
      <Representation id="FLAC,44100,16" codecs="flac" bandwidth="1000000" audioSamplingRate="44100">
        <SegmentTemplate timescale="44100" initialization="https://cdn.example/0.mp4?token=a&amp;b=1" media="https://cdn.example/$Number$.mp4?token=a&amp;b=1" startNumber="1">
          <SegmentTimeline>
            <S d="100"/>
            <S d="200" r="2"/>
          </SegmentTimeline>
        </SegmentTemplate>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

    const PLAIN: &str = r#"<MPD>
  <Period>
    <AdaptationSet>
      <Representation>
        <SegmentTemplate initialization="https://x/init" media="https://x/seg_$Number$">
          <SegmentTimeline><S d="10" r="4"/></SegmentTimeline>
        </SegmentTemplate>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

    #[test]
    fn test_segment_count_sums_repeats() {
        let entries = [TimelineEntry::new(100, 0), TimelineEntry::new(200, 2)];
        assert_eq!(segment_count(&entries), 4);
    }

    #[test]
    fn test_decode_namespaced_manifest() {
        let manifest = ManifestDecoder::new().decode(&encode(NAMESPACED)).unwrap();

        assert_eq!(manifest.init_url(), "https://cdn.example/0.mp4?token=a&b=1");
        assert_eq!(
            manifest.media_template(),
            "https://cdn.example/$Number$.mp4?token=a&b=1"
        );
        assert_eq!(manifest.segment_count(), 4);
    }

    #[test]
    fn test_decode_plain_manifest() {
        let manifest = ManifestDecoder::new().decode(&encode(PLAIN)).unwrap();

        assert_eq!(manifest.init_url(), "https://x/init");
        assert_eq!(manifest.media_template(), "https://x/seg_$Number$");
        assert_eq!(manifest.segment_count(), 5);
    }

    #[test]
    fn test_decode_prefixed_namespace() {
        let document = r#"<mpd:MPD xmlns:mpd="urn:mpeg:dash:schema:mpd:2011">
  <mpd:SegmentTemplate initialization="i" media="m$Number$">
    <mpd:SegmentTimeline><mpd:S d="1" r="1"/><mpd:S d="2"/></mpd:SegmentTimeline>
  </mpd:SegmentTemplate>
</mpd:MPD>"#;
        let manifest = ManifestDecoder::new().decode(&encode(document)).unwrap();
        assert_eq!(manifest.segment_count(), 3);
    }

    #[test]
    fn test_decode_ignores_foreign_namespace() {
        let document = r#"<MPD xmlns:x="urn:other">
  <x:SegmentTemplate initialization="bad" media="bad"/>
  <SegmentTemplate initialization="good" media="good$Number$"/>
</MPD>"#;
        let manifest = ManifestDecoder::new().decode(&encode(document)).unwrap();
        assert_eq!(manifest.init_url(), "good");
    }

    #[test]
    fn test_decode_without_timeline_is_init_only() {
        let document = r#"<MPD><SegmentTemplate initialization="https://x/init" media="https://x/$Number$"/></MPD>"#;
        let manifest = ManifestDecoder::new().decode(&encode(document)).unwrap();
        assert_eq!(manifest.segment_count(), 0);
    }

    #[test]
    fn test_decode_only_counts_direct_timeline() {
        let document = r#"<MPD>
  <SegmentTemplate initialization="i" media="m$Number$">
    <SegmentTimeline><S d="5" r="1"/></SegmentTimeline>
  </SegmentTemplate>
  <SegmentTemplate initialization="j" media="n$Number$">
    <SegmentTimeline><S d="5" r="9"/></SegmentTimeline>
  </SegmentTemplate>
</MPD>"#;
        let manifest = ManifestDecoder::new().decode(&encode(document)).unwrap();
        assert_eq!(manifest.init_url(), "i");
        assert_eq!(manifest.segment_count(), 2);
    }

    #[test]
    fn test_decode_rejects_short_input() {
        let err = ManifestDecoder::new().decode("abc").unwrap_err();
        assert!(matches!(err, ManifestError::TooShort { len: 3 }));

        let err = ManifestDecoder::new().decode("").unwrap_err();
        assert!(matches!(err, ManifestError::TooShort { len: 0 }));
    }

    #[test]
    fn test_decode_rejects_bad_envelope() {
        let err = ManifestDecoder::new().decode("!!!!not-base64!!!!").unwrap_err();
        assert!(matches!(err, ManifestError::Envelope(_)));
    }

    #[test]
    fn test_decode_rejects_non_utf8() {
        let encoded = BASE64.encode([0xff, 0xfe, 0xfd, 0xfc, 0xfb, 0xfa, 0xf9, 0xf8]);
        let err = ManifestDecoder::new().decode(&encoded).unwrap_err();
        assert!(matches!(err, ManifestError::Encoding(_)));
    }

    #[test]
    fn test_decode_rejects_malformed_document() {
        let err = ManifestDecoder::new()
            .decode(&encode("<MPD><SegmentTemplate></MPD>"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_document() {
        let truncated = PLAIN
            .split("</SegmentTimeline>")
            .next()
            .unwrap()
            .to_string();
        let err = ManifestDecoder::new().decode(&encode(&truncated)).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_multiple_roots() {
        let document = format!("{PLAIN}<MPD><Period/></MPD>");
        let err = ManifestDecoder::new().decode(&encode(&document)).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));

        let document = format!("{PLAIN}<Extra/>");
        let err = ManifestDecoder::new().decode(&encode(&document)).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_document_without_root() {
        let err = ManifestDecoder::new()
            .decode(&encode("<?xml version=\"1.0\"?>  "))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_oversized_timeline() {
        let document = r#"<MPD><SegmentTemplate initialization="i" media="m$Number$"><SegmentTimeline><S d="1" r="4000000000"/></SegmentTimeline></SegmentTemplate></MPD>"#;
        let err = ManifestDecoder::new().decode(&encode(document)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::TooManySegments {
                count: 4_000_000_001,
                max: MAX_SEGMENTS
            }
        ));
    }

    #[test]
    fn test_decode_accepts_timeline_at_segment_cap() {
        let document = format!(
            r#"<MPD><SegmentTemplate initialization="i" media="m$Number$"><SegmentTimeline><S d="1" r="{}"/></SegmentTimeline></SegmentTemplate></MPD>"#,
            MAX_SEGMENTS - 1
        );
        let manifest = ManifestDecoder::new().decode(&encode(&document)).unwrap();
        assert_eq!(manifest.segment_count(), MAX_SEGMENTS);
    }

    #[test]
    fn test_decode_rejects_missing_descriptor() {
        let err = ManifestDecoder::new()
            .decode(&encode("<MPD><Period/></MPD>"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::MissingDescriptor));
    }

    #[test]
    fn test_decode_rejects_missing_media() {
        let err = ManifestDecoder::new()
            .decode(&encode(r#"<MPD><SegmentTemplate initialization="i"/></MPD>"#))
            .unwrap_err();
        assert!(matches!(err, ManifestError::MissingAttribute("media")));
    }

    #[test]
    fn test_decode_rejects_empty_initialization() {
        let err = ManifestDecoder::new()
            .decode(&encode(
                r#"<MPD><SegmentTemplate initialization="" media="m"/></MPD>"#,
            ))
            .unwrap_err();
        assert!(matches!(err, ManifestError::MissingAttribute("initialization")));
    }

    #[test]
    fn test_decode_rejects_negative_repeat() {
        let document = r#"<MPD><SegmentTemplate initialization="i" media="m"><SegmentTimeline><S d="1" r="-1"/></SegmentTimeline></SegmentTemplate></MPD>"#;
        let err = ManifestDecoder::new().decode(&encode(document)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidAttribute { attribute: "r", .. }
        ));
    }

    #[test]
    fn test_decode_accepts_wrapped_base64() {
        let encoded = encode(PLAIN);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| format!("{}\n", std::str::from_utf8(line).unwrap()))
            .collect();
        let manifest = ManifestDecoder::new().decode(&wrapped).unwrap();
        assert_eq!(manifest.segment_count(), 5);
    }
}
