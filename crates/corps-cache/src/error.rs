//! Error types for cache operations.

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The value could not be converted into its stored form.
    #[error("Failed to encode cache value for '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },

    /// The stored value does not match the requested type.
    #[error("Failed to decode cache value for '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
