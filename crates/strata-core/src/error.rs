use thiserror::Error;

/// Top-level error type for the Strata system.
///
/// Ingestion, storage, and query failures all surface through this enum so
/// that the `?` operator works across crate boundaries. The API crate maps
/// each variant onto an HTTP status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StrataError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read source {path}: {message}")]
    SourceRead { path: String, message: String },

    #[error("Embedding model not available: {0}")]
    EmbedderUnavailable(String),

    #[error("Embedding timed out after {timeout_ms} ms")]
    EmbedderTimeout { timeout_ms: u64 },

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Dimension mismatch: store has {expected} dimensions, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for StrataError {
    fn from(err: toml::de::Error) -> Self {
        StrataError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StrataError {
    fn from(err: toml::ser::Error) -> Self {
        StrataError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;
