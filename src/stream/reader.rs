use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{PtreeError, Result};
use crate::store::ChunkStore;
use crate::types::{Entry, Index};

use super::codec;

/// Forward-only decoder for the entries of a single chunk.
///
/// The blob is fetched lazily on first access; entries are decoded on demand
/// into a small lookahead buffer, which serves `peek`/`peek2` without any
/// cursor rewinding. Reading past the last entry yields `Ok(None)`, a normal
/// loop-termination condition distinct from I/O failure.
#[derive(Debug)]
pub struct StreamReader<S: ChunkStore> {
    store: Arc<S>,
    index: Index,
    buf: Option<Vec<u8>>,
    pos: usize,
    prev_key: Vec<u8>,
    lookahead: VecDeque<Entry>,
}

impl<S: ChunkStore> StreamReader<S> {
    pub fn new(store: Arc<S>, index: Index) -> Self {
        StreamReader {
            store,
            index,
            buf: None,
            pos: 0,
            prev_key: Vec::new(),
            lookahead: VecDeque::with_capacity(2),
        }
    }

    /// The smallest key reachable through this chunk, per its index.
    pub fn first(&self) -> &[u8] {
        &self.index.first
    }

    /// Decodes until `n` entries are buffered or the chunk is exhausted.
    async fn fill(&mut self, n: usize) -> Result<()> {
        if self.buf.is_none() {
            let bytes = self
                .store
                .get(&self.index.hash)
                .await?
                .ok_or(PtreeError::ChunkNotFound(self.index.hash))?;
            self.buf = Some(bytes);
        }
        let buf = self.buf.as_ref().unwrap();
        while self.lookahead.len() < n && self.pos < buf.len() {
            let (ent, used) = codec::decode_entry(&buf[self.pos..], &mut self.prev_key)?;
            self.pos += used;
            self.lookahead.push_back(ent);
        }
        Ok(())
    }

    /// Returns the next entry and consumes it.
    pub async fn next(&mut self) -> Result<Option<Entry>> {
        self.fill(1).await?;
        Ok(self.lookahead.pop_front())
    }

    /// Returns the next entry without consuming it. Idempotent.
    pub async fn peek(&mut self) -> Result<Option<Entry>> {
        self.fill(1).await?;
        Ok(self.lookahead.front().cloned())
    }

    /// Returns the entry after the next one, if the chunk holds one.
    pub async fn peek2(&mut self) -> Result<Option<Entry>> {
        self.fill(2).await?;
        Ok(self.lookahead.get(1).cloned())
    }

    /// Discards entries with keys below `target`. Linear within the chunk;
    /// cross-chunk positioning is the cursor's job.
    pub async fn seek(&mut self, target: &[u8]) -> Result<()> {
        while let Some(ent) = self.peek().await? {
            if ent.key.as_slice() >= target {
                break;
            }
            self.lookahead.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TreeConfig;
    use crate::store::InMemoryStore;
    use crate::stream::writer::StreamWriter;

    fn entries(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| Entry::new(format!("key{i:05}").into_bytes(), format!("val{i}").into_bytes()))
            .collect()
    }

    async fn write_stream(ents: &[Entry]) -> (Arc<InMemoryStore>, Vec<Index>) {
        let store = Arc::new(InMemoryStore::new());
        let config = TreeConfig {
            avg_chunk_size: 256,
            max_chunk_size: 1024,
        };
        let mut writer = StreamWriter::new(Arc::clone(&store), &config).unwrap();
        let mut indexes = Vec::new();
        for ent in ents {
            indexes.extend(writer.append(ent).await.unwrap());
        }
        indexes.extend(writer.flush().await.unwrap());
        (store, indexes)
    }

    #[tokio::test]
    async fn reads_back_what_the_writer_wrote() {
        let ents = entries(500);
        let (store, indexes) = write_stream(&ents).await;
        assert!(indexes.len() > 1, "expected multiple chunks");

        let mut got = Vec::new();
        for idx in &indexes {
            let mut reader = StreamReader::new(Arc::clone(&store), idx.clone());
            while let Some(ent) = reader.next().await.unwrap() {
                got.push(ent);
            }
        }
        assert_eq!(got, ents);

        // Each index's first key is the first entry of its chunk.
        let mut offset = 0;
        for idx in &indexes {
            assert_eq!(idx.first, got[offset].key);
            let mut reader = StreamReader::new(Arc::clone(&store), idx.clone());
            let mut n = 0;
            while reader.next().await.unwrap().is_some() {
                n += 1;
            }
            offset += n;
        }
    }

    #[tokio::test]
    async fn peek_is_idempotent_and_peek2_looks_one_further() {
        let ents = entries(10);
        let (store, indexes) = write_stream(&ents).await;
        let mut reader = StreamReader::new(store, indexes[0].clone());
        let a = reader.peek().await.unwrap().unwrap();
        let b = reader.peek().await.unwrap().unwrap();
        assert_eq!(a, b);
        let second = reader.peek2().await.unwrap().unwrap();
        assert_eq!(reader.next().await.unwrap().unwrap(), a);
        assert_eq!(reader.peek().await.unwrap().unwrap(), second);
    }

    #[tokio::test]
    async fn seek_lands_on_first_key_at_or_after_target() {
        let ents = entries(20);
        let (store, indexes) = write_stream(&ents).await;
        let mut reader = StreamReader::new(store, indexes[0].clone());
        reader.seek(b"key00007").await.unwrap();
        assert_eq!(reader.next().await.unwrap().unwrap().key, b"key00007".to_vec());
        // Seeking past the end exhausts the chunk.
        reader.seek(b"zzz").await.unwrap();
        assert_eq!(reader.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_chunk_is_a_distinct_error() {
        let store = Arc::new(InMemoryStore::new());
        let mut reader = StreamReader::new(
            store,
            Index {
                first: Vec::new(),
                hash: [0x42; 32],
            },
        );
        let err = reader.next().await.unwrap_err();
        assert!(matches!(err, PtreeError::ChunkNotFound(_)));
    }
}
