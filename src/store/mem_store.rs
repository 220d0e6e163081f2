use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::chunk_store::ChunkStore;
use crate::common::{Hash, hash_bytes};
use crate::error::Result;

#[derive(Debug, Default)]
struct InMemoryStoreInner {
    data: HashMap<Hash, Vec<u8>>,
}

/// An in-memory `ChunkStore` implementation using `tokio::sync::RwLock`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<InMemoryStoreInner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.data.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        let guard = self.inner.read().await;
        Ok(guard.data.get(hash).cloned())
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<Hash> {
        let hash = hash_bytes(&bytes);
        let mut guard = self.inner.write().await;
        guard.data.entry(hash).or_insert(bytes);
        Ok(hash)
    }

    async fn delete_batch(&self, hashes: &[Hash]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let mut guard = self.inner.write().await;
        for hash in hashes {
            guard.data.remove(hash);
        }
        Ok(())
    }

    async fn all_hashes(&self) -> Result<Vec<Hash>> {
        let guard = self.inner.read().await;
        Ok(guard.data.keys().cloned().collect())
    }
}
