//! Error types for the editing core.
//!
//! Expected user-input outcomes (rejected files, no-op commands, malformed
//! HTML) are not errors; they are reported through task status, `ok = false`
//! and lossy coercion respectively.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors from invalid arguments to the editing core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditorError {
    /// Colour string is not `#rgb` or `#rrggbb`.
    #[error("invalid hex colour: {0:?}")]
    InvalidColor(SmolStr),

    /// Heading level outside 1..=3.
    #[error("unsupported heading level: {0}")]
    InvalidHeadingLevel(u8),

    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from the image upload pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UploadError {
    /// The upload strategy failed (network, storage, ...).
    #[error("image upload failed: {0}")]
    Strategy(String),

    /// The strategy resolved to an empty URL.
    #[error("upload strategy returned an empty url")]
    EmptyUrl,

    /// The editing session ended before the upload resolved.
    #[error("editing session closed before upload finished")]
    SessionClosed,
}

impl From<String> for UploadError {
    fn from(s: String) -> Self {
        UploadError::Strategy(s)
    }
}

impl From<&str> for UploadError {
    fn from(s: &str) -> Self {
        UploadError::Strategy(s.to_string())
    }
}
