//! Error types for manifest decoding.

use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Reasons a manifest could not be decoded.
///
/// Every variant surfaces to job callers as a single `ManifestInvalid`
/// failure; the detail is kept for logs and diagnostics.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Input is empty or shorter than any valid envelope.
    #[error("manifest is empty or too short ({len} bytes)")]
    TooShort { len: usize },

    /// The base64 envelope could not be decoded.
    #[error("invalid manifest envelope: {0}")]
    Envelope(#[from] base64::DecodeError),

    /// The decoded payload is not UTF-8 text.
    #[error("manifest document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// The embedded document is not well-formed XML.
    #[error("malformed manifest document: {0}")]
    Malformed(String),

    /// No `SegmentTemplate` element was found.
    #[error("could not find SegmentTemplate in manifest")]
    MissingDescriptor,

    /// A mandatory `SegmentTemplate` attribute is absent or empty.
    #[error("SegmentTemplate is missing the '{0}' attribute")]
    MissingAttribute(&'static str),

    /// A timeline attribute is not a valid number.
    #[error("invalid value '{value}' for timeline attribute '{attribute}'")]
    InvalidAttribute { attribute: &'static str, value: String },

    /// The timeline declares more segments than a job will fetch.
    #[error("manifest declares {count} segments, more than the limit of {max}")]
    TooManySegments { count: u64, max: u32 },

    /// The media template does not contain exactly one placeholder.
    #[error("media template must contain '{placeholder}' exactly once (found {found})")]
    Placeholder { placeholder: String, found: usize },
}

impl From<quick_xml::Error> for ManifestError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ManifestError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Malformed(err.to_string())
    }
}
