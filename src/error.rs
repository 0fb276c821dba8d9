//! Error types for mind map operations.
//!
//! Embedding failures never appear here: they degrade to an empty
//! fingerprint inside the builder.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MindMapError>;

#[derive(Debug, Error)]
pub enum MindMapError {
    /// The text generator returned no usable draft.
    #[error("Mind map generation failed: {0}")]
    Generation(String),

    /// Export or lookup on a node id that does not exist.
    #[error("Node not found: {0}")]
    NotFound(String),

    /// Refused at the boundary before touching the graph.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// A persistence primitive failed.
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A building task panicked or was cancelled.
    #[error("Build task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for MindMapError {
    fn from(e: tokio::task::JoinError) -> Self {
        MindMapError::Join(e.to_string())
    }
}
