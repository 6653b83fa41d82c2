//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for URI parsing
pub type Result<T> = std::result::Result<T, UriError>;

/// Failures while turning a URI string into a typed location.
///
/// Every variant is a validation failure: it is raised before any network or
/// storage access and is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("Unsupported URL scheme '{scheme}' in {uri} (expected one of: {expected})")]
    UnsupportedScheme {
        scheme: String,
        uri: String,
        expected: String,
    },

    #[error("Bucket or server name is missing in the URL: {uri}")]
    MissingAuthority { uri: String },

    #[error("File name is missing in the URL: {uri}")]
    MissingObjectName { uri: String },

    #[error("Malformed URL {uri}: {reason}")]
    Malformed { uri: String, reason: String },
}

impl UriError {
    pub fn uri(&self) -> &str {
        match self {
            UriError::UnsupportedScheme { uri, .. }
            | UriError::MissingAuthority { uri }
            | UriError::MissingObjectName { uri }
            | UriError::Malformed { uri, .. } => uri,
        }
    }
}
