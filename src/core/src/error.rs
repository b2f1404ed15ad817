use thiserror::Error;

use crate::source::SourceKind;

/// imgscope error types
#[derive(Error, Debug)]
pub enum ScopeError {
    /// The input could not be classified into a known source kind
    #[error("unable to detect image source: {0}")]
    Classification(String),

    /// A classified source kind has no provider
    #[error("unable to determine image source provider for '{0}'")]
    Dispatch(SourceKind),

    /// The image was acquired but could not be materialized
    #[error("could not read image: {0}")]
    Read(#[source] Box<ScopeError>),

    /// OCI image layout or blob error
    #[error("OCI image error: {0}")]
    OciImageError(String),

    /// Docker archive or daemon error
    #[error("Docker error: {0}")]
    Docker(String),

    /// Blob content does not match its descriptor
    #[error("Digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Layer media type that cannot be extracted
    #[error("Unsupported layer media type: {0}")]
    UnsupportedMediaType(String),

    /// Best-effort scratch-space teardown left directories behind
    #[error("failed to remove {failed} temporary path(s), first error: {first}")]
    Cleanup { failed: usize, first: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ScopeError {
    /// Wrap an error raised while reading an acquired image.
    pub fn read(err: ScopeError) -> Self {
        ScopeError::Read(Box::new(err))
    }
}

impl From<serde_json::Error> for ScopeError {
    fn from(err: serde_json::Error) -> Self {
        ScopeError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ScopeError {
    fn from(err: serde_yaml::Error) -> Self {
        ScopeError::SerializationError(err.to_string())
    }
}

/// Result type alias for imgscope operations
pub type Result<T> = std::result::Result<T, ScopeError>;
