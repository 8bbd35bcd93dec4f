//! Codec error taxonomy.

/// Errors produced while encoding or decoding tagged values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed array: {0}")]
    MalformedArray(String),

    #[error("unknown element type: {0}")]
    UnknownElementType(String),

    #[error("malformed dataset: {0}")]
    MalformedDataset(String),

    #[error("element type mismatch: expected {expected}, found {actual}")]
    DTypeMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
