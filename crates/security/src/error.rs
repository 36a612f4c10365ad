//! Security specific errors for the Citadel browser engine.

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SecurityError {
    #[error("Invalid URI {href:?}: {source}")]
    InvalidUri {
        href: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Cross-origin URI rejected: {target} is not same-origin with {source_uri}")]
    CrossOrigin { source_uri: String, target: String },
}

impl SecurityError {
    /// Returns true if the error is an origin policy violation rather than malformed input
    pub fn is_origin_violation(&self) -> bool {
        matches!(self, SecurityError::CrossOrigin { .. })
    }
}

pub type SecurityResult<T> = Result<T, SecurityError>;
