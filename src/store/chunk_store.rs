use async_trait::async_trait;

use crate::common::Hash;
use crate::error::Result;

/// Trait for a content-addressable chunk store.
///
/// Implementations store and retrieve opaque byte chunks addressed by the
/// Blake3 hash of their content. The tree engine consumes this as a
/// capability and never retries on its own; retry policy belongs to the
/// implementation or its caller.
#[async_trait]
pub trait ChunkStore: std::fmt::Debug + Send + Sync + 'static {
    /// Retrieves a chunk by its hash. Returns `Ok(None)` if absent.
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>>;

    /// Stores a chunk and returns its content hash. Idempotent: posting a
    /// chunk that is already present is a no-op yielding the same hash.
    async fn put(&self, bytes: Vec<u8>) -> Result<Hash>;

    /// Checks if a chunk with the given hash exists in the store.
    async fn exists(&self, hash: &Hash) -> Result<bool> {
        self.get(hash).await.map(|opt| opt.is_some())
    }

    /// Deletes a batch of chunks. Succeeds even if some hashes are absent.
    /// Primarily for use by the reachability sweep.
    async fn delete_batch(&self, hashes: &[Hash]) -> Result<()>;

    /// Lists every chunk hash currently present in the store.
    async fn all_hashes(&self) -> Result<Vec<Hash>>;
}
