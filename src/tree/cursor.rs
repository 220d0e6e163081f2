use std::sync::Arc;

use async_recursion::async_recursion;

use crate::common::Key;
use crate::error::Result;
use crate::store::ChunkStore;
use crate::stream::StreamReader;
use crate::types::{Entry, Index, Root, Span};

/// Lazy ordered traversal over the entries of a tree, restricted to a span.
///
/// One optional reader per level: the top is seeded from the root, lower
/// levels are opened on demand by pulling one index entry from the level
/// above; an exhausted level is cleared and re-opened from the next index.
/// Subtrees that provably end below the span (or start at or beyond its end)
/// are skipped by looking at the *next* index's first key, never by
/// decoding the subtree itself.
///
/// The cursor is a stateful forward iterator; it is not meant for use from
/// multiple tasks at once.
#[derive(Debug)]
pub struct Cursor<S: ChunkStore> {
    store: Arc<S>,
    span: Span,
    levels: Vec<Option<StreamReader<S>>>,
    /// Lower bound for data entries. Starts at the span's first key and is
    /// raised by `seek`.
    floor: Option<Key>,
}

impl<S: ChunkStore> Cursor<S> {
    pub fn new(store: Arc<S>, root: Root, span: Span) -> Self {
        let depth = root.depth as usize;
        let mut levels: Vec<Option<StreamReader<S>>> = Vec::with_capacity(depth + 1);
        for _ in 0..depth {
            levels.push(None);
        }
        levels.push(Some(StreamReader::new(
            Arc::clone(&store),
            Index {
                first: Vec::new(),
                hash: root.hash,
            },
        )));
        let floor = span.first.clone();
        Cursor {
            store,
            span,
            levels,
            floor,
        }
    }

    fn top(&self) -> usize {
        self.levels.len() - 1
    }

    /// The lowest level with an open reader. Levels below it are fully
    /// consumed, so the next entries can be taken wholesale at this level.
    pub(crate) fn synced_below(&self) -> usize {
        for (i, level) in self.levels.iter().enumerate() {
            if level.is_some() {
                return i;
            }
        }
        self.top()
    }

    /// Returns the next entry and consumes it, honoring the span.
    pub async fn next(&mut self) -> Result<Option<Entry>> {
        loop {
            let Some(ent) = self.peek_at(0).await? else {
                return Ok(None);
            };
            if let Some(floor) = &self.floor {
                if ent.key.as_slice() < floor.as_slice() {
                    self.next_at(0).await?;
                    continue;
                }
            }
            if let Some(last) = &self.span.last {
                if ent.key.as_slice() >= last.as_slice() {
                    return Ok(None);
                }
            }
            self.next_at(0).await?;
            return Ok(Some(ent));
        }
    }

    /// Returns the next entry without consuming it, honoring the span.
    pub async fn peek(&mut self) -> Result<Option<Entry>> {
        loop {
            let Some(ent) = self.peek_at(0).await? else {
                return Ok(None);
            };
            if let Some(floor) = &self.floor {
                if ent.key.as_slice() < floor.as_slice() {
                    self.next_at(0).await?;
                    continue;
                }
            }
            if let Some(last) = &self.span.last {
                if ent.key.as_slice() >= last.as_slice() {
                    return Ok(None);
                }
            }
            return Ok(Some(ent));
        }
    }

    /// Positions the cursor at the first entry with key >= `target`. Only
    /// moves forward; seeking behind the current position is a no-op.
    pub async fn seek(&mut self, target: &[u8]) -> Result<()> {
        match &self.floor {
            Some(f) if f.as_slice() >= target => return Ok(()),
            _ => self.floor = Some(target.to_vec()),
        }
        // Fast-forward every currently-open level in ascending depth order.
        // Levels opened later are positioned by the floor check in the open
        // path instead.
        for level in 0..self.levels.len() {
            let Some(reader) = self.levels[level].as_mut() else {
                continue;
            };
            if level == 0 {
                reader.seek(target).await?;
            } else {
                // Keep the index whose subtree may still contain the target:
                // discard entries as long as the following one starts at or
                // below it.
                loop {
                    match reader.peek2().await? {
                        Some(e2) if e2.key.as_slice() <= target => {
                            reader.next().await?;
                        }
                        _ => break,
                    }
                }
            }
        }
        Ok(())
    }

    /// Peeks the head entry at `level`: data entries at level 0, index
    /// entries above. Opens levels as needed.
    pub(crate) async fn peek_at(&mut self, level: usize) -> Result<Option<Entry>> {
        if !self.ensure_open(level).await? {
            return Ok(None);
        }
        self.levels[level].as_mut().unwrap().peek().await
    }

    /// Consumes the head entry at `level`. Callers above level 0 must have
    /// consumed every lower level first (see `synced_below`).
    pub(crate) async fn next_at(&mut self, level: usize) -> Result<Option<Entry>> {
        if !self.ensure_open(level).await? {
            return Ok(None);
        }
        self.levels[level].as_mut().unwrap().next().await
    }

    /// The first key following the current head entry's subtree at `level`:
    /// the next entry within the same chunk, or the unconsumed index one
    /// level up. `None` means the head reaches the end of the tree.
    #[async_recursion]
    pub(crate) async fn next_boundary(&mut self, level: usize) -> Result<Option<Key>> {
        if let Some(reader) = self.levels[level].as_mut() {
            if let Some(e2) = reader.peek2().await? {
                return Ok(Some(e2.key));
            }
        }
        if level == self.top() {
            return Ok(None);
        }
        if !self.ensure_open(level + 1).await? {
            return Ok(None);
        }
        Ok(self.levels[level + 1]
            .as_mut()
            .unwrap()
            .peek()
            .await?
            .map(|e| e.key))
    }

    /// Makes `levels[level]` an open reader with at least one pending entry.
    /// Returns false once the tree is exhausted at this level, or every
    /// remaining subtree starts at or beyond the span's end.
    #[async_recursion]
    async fn ensure_open(&mut self, level: usize) -> Result<bool> {
        loop {
            if let Some(reader) = self.levels[level].as_mut() {
                if reader.peek().await?.is_some() {
                    return Ok(true);
                }
                if level == self.top() {
                    return Ok(false);
                }
                self.levels[level] = None;
            }
            // Open the next chunk at this level from an index one level up.
            loop {
                if !self.ensure_open(level + 1).await? {
                    return Ok(false);
                }
                let head = self.levels[level + 1]
                    .as_mut()
                    .unwrap()
                    .peek()
                    .await?
                    .unwrap();
                if let Some(last) = &self.span.last {
                    if head.key.as_slice() >= last.as_slice() {
                        return Ok(false);
                    }
                }
                // Skip subtrees that end at or below the floor without
                // descending into them.
                if let Some(floor) = self.floor.clone() {
                    if let Some(bound) = self.next_boundary(level + 1).await? {
                        if bound.as_slice() <= floor.as_slice() {
                            self.levels[level + 1].as_mut().unwrap().next().await?;
                            continue;
                        }
                    }
                }
                let ent = self.levels[level + 1].as_mut().unwrap().next().await?.unwrap();
                let idx = Index::from_entry(&ent)?;
                self.levels[level] = Some(StreamReader::new(Arc::clone(&self.store), idx));
                break;
            }
        }
    }
}
