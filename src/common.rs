use serde::{Deserialize, Serialize};

use crate::error::{PtreeError, Result};

/// A 32-byte content hash, from Blake3.
pub type Hash = [u8; 32];

/// Type alias for keys stored in the tree.
pub type Key = Vec<u8>;

/// Type alias for values stored in the tree.
pub type Value = Vec<u8>;

pub fn hash_bytes(bytes: &[u8]) -> Hash {
    blake3::hash(bytes).into()
}

/// Configuration for the tree engine.
///
/// The chunk sizes drive the content-defined chunker: `avg_chunk_size` sets
/// the statistical target (must be a power of two), `max_chunk_size` is a
/// hard upper bound on any single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Average chunk size target. Must be a power of two.
    pub avg_chunk_size: usize,
    /// Maximum chunk size. No chunk, and therefore no single encoded entry,
    /// may exceed this.
    pub max_chunk_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            avg_chunk_size: 16 * 1024,
            max_chunk_size: 64 * 1024,
        }
    }
}

impl TreeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.avg_chunk_size == 0 || !self.avg_chunk_size.is_power_of_two() {
            return Err(PtreeError::Config(format!(
                "avg_chunk_size must be a non-zero power of two, got {}",
                self.avg_chunk_size
            )));
        }
        if self.max_chunk_size < self.avg_chunk_size {
            return Err(PtreeError::Config(format!(
                "max_chunk_size ({}) must be >= avg_chunk_size ({})",
                self.max_chunk_size, self.avg_chunk_size
            )));
        }
        Ok(())
    }
}
