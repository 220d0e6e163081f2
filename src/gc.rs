//! Reachability sweep over the chunk store.
//!
//! Trees never delete chunks themselves; a new root simply stops
//! referencing some of them. This module walks the index levels of every
//! live root to mark reachable chunks, then sweeps the rest.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use log::trace;

use crate::common::Hash;
use crate::error::{PtreeError, Result};
use crate::store::ChunkStore;
use crate::stream::codec;
use crate::types::{Index, Root};

/// The set of chunk hashes reachable from `root`, including the root chunk
/// itself. Also serves as the chunk-sharing metric between two roots.
pub async fn reachable<S: ChunkStore>(store: &Arc<S>, root: &Root) -> Result<HashSet<Hash>> {
    let mut live = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((root.hash, root.depth));
    while let Some((hash, depth)) = queue.pop_front() {
        if !live.insert(hash) {
            continue;
        }
        if depth == 0 {
            // Leaf chunk: data entries only, nothing further to follow.
            continue;
        }
        let bytes = store
            .get(&hash)
            .await?
            .ok_or(PtreeError::ChunkNotFound(hash))?;
        let mut prev_key = Vec::new();
        let mut off = 0;
        while off < bytes.len() {
            let (ent, used) = codec::decode_entry(&bytes[off..], &mut prev_key)?;
            off += used;
            let idx = Index::from_entry(&ent)?;
            queue.push_back((idx.hash, depth - 1));
        }
    }
    Ok(live)
}

pub struct GarbageCollector<S: ChunkStore> {
    store: Arc<S>,
}

impl<S: ChunkStore> GarbageCollector<S> {
    pub fn new(store: Arc<S>) -> Self {
        GarbageCollector { store }
    }

    /// Marks every chunk reachable from `live_roots` and deletes the rest.
    /// Returns the number of chunks swept.
    pub async fn collect(&self, live_roots: &[Root]) -> Result<usize> {
        let all_hashes = self.store.all_hashes().await?;
        if all_hashes.is_empty() {
            return Ok(0);
        }
        trace!(
            "gc: marking from {} root(s) over {} chunks",
            live_roots.len(),
            all_hashes.len()
        );

        let mut live: HashSet<Hash> = HashSet::new();
        for root in live_roots {
            live.extend(reachable(&self.store, root).await?);
        }

        let dead: Vec<Hash> = all_hashes
            .into_iter()
            .filter(|h| !live.contains(h))
            .collect();
        trace!("gc: {} live, sweeping {}", live.len(), dead.len());
        self.store.delete_batch(&dead).await?;
        Ok(dead.len())
    }
}
