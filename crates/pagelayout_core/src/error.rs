//! Caller-visible transcoder errors.
//!
//! # Responsibility
//! - Report precondition violations of the stored document envelope.
//! - Wrap text-level parse failures from the YAML/JSON readers.
//!
//! # Invariants
//! - Data-level defects inside a well-shaped document never become errors;
//!   they degrade to default typing in the codec instead.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by document-level transcoder APIs.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Errors surfaced by document parsing, decode and encode entry points.
#[derive(Debug)]
pub enum LayoutError {
    /// Input document is not a mapping at all.
    InvalidDocumentShape {
        /// Short name of the value kind that was found instead.
        found: &'static str,
    },
    /// Envelope declares a format version this codec does not read.
    UnsupportedVersion { found: u64, supported: u64 },
    /// Input text is not valid YAML.
    Yaml(serde_yaml::Error),
    /// Input text is not valid JSON, or a tree could not be (de)serialized.
    Json(serde_json::Error),
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDocumentShape { found } => {
                write!(f, "layout document must be a mapping, found {found}")
            }
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "layout document version {found} is not supported (expected {supported})"
            ),
            Self::Yaml(err) => write!(f, "invalid yaml: {err}"),
            Self::Json(err) => write!(f, "invalid json: {err}"),
        }
    }
}

impl Error for LayoutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDocumentShape { .. } => None,
            Self::UnsupportedVersion { .. } => None,
            Self::Yaml(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for LayoutError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

impl From<serde_json::Error> for LayoutError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
