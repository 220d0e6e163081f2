use std::sync::Arc;

use async_recursion::async_recursion;

use crate::common::{Key, TreeConfig, Value};
use crate::error::{PtreeError, Result};
use crate::store::ChunkStore;
use crate::stream::StreamWriter;
use crate::types::{Entry, Root};

/// Turns an ordered sequence of `put` calls into a [`Root`], growing tree
/// levels as needed.
///
/// Level 0 holds data entries; every completed level-N chunk is reported as
/// an index entry and appended to level N+1, which is created on demand.
/// `finish` consumes the builder, so a finished builder cannot be reused;
/// the terminal state is enforced by ownership rather than a runtime flag.
#[derive(Debug)]
pub struct Builder<S: ChunkStore> {
    store: Arc<S>,
    config: TreeConfig,
    levels: Vec<StreamWriter<S>>,
}

impl<S: ChunkStore> Builder<S> {
    pub fn new(store: Arc<S>, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let levels = vec![StreamWriter::new(Arc::clone(&store), &config)?];
        Ok(Builder {
            store,
            config,
            levels,
        })
    }

    /// Appends one data entry. Keys must be strictly increasing across the
    /// lifetime of the builder.
    pub async fn put(&mut self, key: Key, value: Value) -> Result<()> {
        self.put_at(0, Entry { key, value }).await
    }

    /// The lowest level with a partially-written chunk. Entries may be
    /// attached at any level up to and including this one; attaching higher
    /// would interleave a subtree ahead of buffered content below it.
    pub(crate) fn synced_below(&self) -> usize {
        for (i, level) in self.levels.iter().enumerate() {
            if level.buffered() > 0 {
                return i;
            }
        }
        usize::MAX
    }

    /// Appends an entry at the given level. For level > 0 the entry is an
    /// index: this attaches an entire existing subtree to the output tree
    /// without re-encoding its contents.
    #[async_recursion]
    pub(crate) async fn put_at(&mut self, level: usize, ent: Entry) -> Result<()> {
        if level > self.synced_below() {
            return Err(PtreeError::Internal(format!(
                "attach at level {level} with unsynced lower levels"
            )));
        }
        while self.levels.len() <= level {
            self.levels
                .push(StreamWriter::new(Arc::clone(&self.store), &self.config)?);
        }
        let indexes = self.levels[level].append(&ent).await?;
        for idx in indexes {
            self.put_at(level + 1, idx.into_entry()).await?;
        }
        Ok(())
    }

    /// Flushes every level bottom-to-top and returns the root of the tree.
    /// A builder that never received an entry yields the explicit empty-blob
    /// root at depth 0.
    pub async fn finish(mut self) -> Result<Root> {
        let mut level = 0;
        loop {
            let indexes = self.levels[level].flush().await?;
            let is_top = level + 1 >= self.levels.len();
            if is_top {
                match indexes.len() {
                    1 => {
                        return Ok(Root {
                            hash: indexes[0].hash,
                            depth: level as u8,
                        });
                    }
                    0 if level == 0 => {
                        let hash = self.store.put(Vec::new()).await?;
                        return Ok(Root { hash, depth: 0 });
                    }
                    0 => {
                        return Err(PtreeError::Internal(
                            "non-leaf top level flushed empty".into(),
                        ));
                    }
                    _ => {}
                }
            }
            for idx in indexes {
                self.put_at(level + 1, idx.into_entry()).await?;
            }
            level += 1;
        }
    }
}
