use thiserror::Error;

use crate::common::Hash;

/// Custom error type for the tree engine.
#[derive(Error, Debug)]
pub enum PtreeError {
    #[error("chunk not found in store for hash: {}", hex::encode(.0))]
    ChunkNotFound(Hash),

    /// Malformed stream data: bad length prefixes, impossible key backspace,
    /// oversized fields. Never silently repaired.
    #[error("corrupt stream: {0}")]
    Corrupt(String),

    /// A producer handed the engine keys out of order. Continuing would
    /// corrupt the first-key invariant of the persistent structure.
    #[error("key out of order: {} after {}", hex::encode(.key), hex::encode(.prev))]
    KeyOutOfOrder { prev: Vec<u8>, key: Vec<u8> },

    /// A single encoded entry cannot fit in one chunk.
    #[error("entry of {size} bytes exceeds max chunk size {max}")]
    EntryTooLarge { size: usize, max: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for tree engine operations.
pub type Result<T> = std::result::Result<T, PtreeError>;
