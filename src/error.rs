//! Error types for document decoding, encoding and comparison.

use thiserror::Error;

/// Errors that can occur while working with HSM GraphML documents.
///
/// The set of variants is closed and stable: every public operation either
/// succeeds or surfaces exactly one of these, unchanged, at the API
/// boundary. There is no recovery and no partial success.
#[derive(Debug, Error)]
pub enum CyberiadaError {
    /// The XML is malformed or carries a wrong namespace.
    #[error("XML error: {0}")]
    Xml(String),

    /// The GraphML violates structural invariants or is in an
    /// unsupported version.
    #[error("format error: {0}")]
    Format(String),

    /// A text node failed the action grammar.
    #[error("action format error: {0}")]
    ActionFormat(String),

    /// The metadata comment body is malformed.
    #[error("metadata format error: {0}")]
    MetadataFormat(String),

    /// A requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The API was misused or a flag combination is illegal.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// An internal invariant tripped; never expected on valid inputs.
    #[error("assertion failed: {0}")]
    Assert(String),

    /// The operation is recognized but not available.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl CyberiadaError {
    /// Create an XML error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Create an action format error.
    pub fn action(message: impl Into<String>) -> Self {
        Self::ActionFormat(message.into())
    }

    /// Create a metadata format error.
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::MetadataFormat(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a bad-parameter error.
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter(message.into())
    }

    /// Create an internal assertion error.
    pub fn assert(message: impl Into<String>) -> Self {
        Self::Assert(message.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CyberiadaError>;
