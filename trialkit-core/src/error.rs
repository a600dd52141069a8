//! Error types for trialkit-core

use thiserror::Error;

/// Error type for trial session operations
#[derive(Debug, Error)]
pub enum TrialkitError {
    /// Item bank could not be parsed
    #[error("Corpus parse error: {0}")]
    CorpusParse(String),

    /// Item bank produced no items and the session is configured to fail
    #[error("Corpus is empty")]
    EmptyCorpus,

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Trial renderer failed to present or collect a response
    #[error("Renderer error: {0}")]
    Renderer(String),

    /// Persistence sink rejected a record
    #[error("Sink error: {0}")]
    Sink(String),

    /// Asset batch could not be preloaded
    #[error("Preload error for batch {batch}: {message}")]
    Preload { batch: usize, message: String },

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for trialkit operations
pub type Result<T> = std::result::Result<T, TrialkitError>;
