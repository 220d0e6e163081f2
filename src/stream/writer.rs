use std::collections::VecDeque;
use std::sync::Arc;

use crate::chunker::Chunker;
use crate::common::{Key, TreeConfig};
use crate::error::{PtreeError, Result};
use crate::store::ChunkStore;
use crate::types::{Entry, Index};

use super::codec;

/// Sequentially encodes entries for one tree level, posting completed chunks
/// to the store.
///
/// `append`/`flush` return the indexes of chunks completed by that call, in
/// emission order; the caller (the Builder) routes them one level up. Keys
/// must be strictly increasing across the whole stream; a violation is a
/// [`PtreeError::KeyOutOfOrder`], since accepting it would corrupt the
/// first-key invariant of the tree.
#[derive(Debug)]
pub struct StreamWriter<S: ChunkStore> {
    store: Arc<S>,
    chunker: Chunker,
    prev_key: Option<Key>,
    /// First key of each chunk currently in flight, oldest first.
    first_keys: VecDeque<Key>,
}

impl<S: ChunkStore> StreamWriter<S> {
    pub fn new(store: Arc<S>, config: &TreeConfig) -> Result<Self> {
        Ok(StreamWriter {
            store,
            chunker: Chunker::new(config.avg_chunk_size, config.max_chunk_size)?,
            prev_key: None,
            first_keys: VecDeque::new(),
        })
    }

    /// Bytes buffered toward the next chunk. Zero means the writer is synced:
    /// everything appended so far has been reported as an index.
    pub fn buffered(&self) -> usize {
        self.chunker.buffered()
    }

    pub async fn append(&mut self, ent: &Entry) -> Result<Vec<Index>> {
        if let Some(prev) = &self.prev_key {
            if ent.key.as_slice() <= prev.as_slice() {
                return Err(PtreeError::KeyOutOfOrder {
                    prev: prev.clone(),
                    key: ent.key.clone(),
                });
            }
        }

        let mut out = Vec::new();
        let mut first = self.chunker.buffered() == 0;
        let mut data = Vec::new();
        codec::encode_entry(
            &mut data,
            if first { None } else { self.prev_key.as_deref() },
            ent,
        );

        // An entry that would overflow the current chunk closes it and opens
        // the next one, where the entry is re-encoded in full-key form.
        if !first && self.chunker.would_overflow(&data) {
            self.chunker.flush();
            self.collect(&mut out).await?;
            data.clear();
            codec::encode_entry(&mut data, None, ent);
            first = true;
        }

        if first {
            self.first_keys.push_back(ent.key.clone());
        }
        self.chunker.write_no_split(&data)?;
        self.collect(&mut out).await?;
        self.prev_key = Some(ent.key.clone());
        Ok(out)
    }

    /// Forces out whatever is buffered. An empty flush emits nothing.
    pub async fn flush(&mut self) -> Result<Vec<Index>> {
        self.chunker.flush();
        let mut out = Vec::new();
        self.collect(&mut out).await?;
        Ok(out)
    }

    /// Posts completed chunks and pairs each with its recorded first key.
    async fn collect(&mut self, out: &mut Vec<Index>) -> Result<()> {
        for chunk in self.chunker.take_chunks() {
            let first = self.first_keys.pop_front().ok_or_else(|| {
                PtreeError::Internal("completed chunk without a recorded first key".into())
            })?;
            let hash = self.store.put(chunk).await?;
            out.push(Index { first, hash });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn small_config() -> TreeConfig {
        TreeConfig {
            avg_chunk_size: 256,
            max_chunk_size: 1024,
        }
    }

    #[tokio::test]
    async fn indexes_partition_the_stream_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = StreamWriter::new(Arc::clone(&store), &small_config()).unwrap();
        let mut indexes = Vec::new();
        for i in 0..1000u32 {
            let ent = Entry::new(format!("{i:08}").into_bytes(), i.to_be_bytes().to_vec());
            indexes.extend(writer.append(&ent).await.unwrap());
        }
        indexes.extend(writer.flush().await.unwrap());

        assert!(indexes.len() > 2);
        for pair in indexes.windows(2) {
            assert!(pair[0].first < pair[1].first);
        }
        assert_eq!(indexes[0].first, b"00000000".to_vec());
        for idx in &indexes {
            assert!(store.exists(&idx.hash).await.unwrap());
        }
    }

    #[tokio::test]
    async fn rejects_out_of_order_and_duplicate_keys() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = StreamWriter::new(store, &small_config()).unwrap();
        writer
            .append(&Entry::new(b"b".to_vec(), b"1".to_vec()))
            .await
            .unwrap();
        let dup = writer.append(&Entry::new(b"b".to_vec(), b"2".to_vec())).await;
        assert!(matches!(dup, Err(PtreeError::KeyOutOfOrder { .. })));
        let behind = writer.append(&Entry::new(b"a".to_vec(), b"3".to_vec())).await;
        assert!(matches!(behind, Err(PtreeError::KeyOutOfOrder { .. })));
    }

    #[tokio::test]
    async fn oversized_entry_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = StreamWriter::new(store, &small_config()).unwrap();
        let err = writer
            .append(&Entry::new(b"k".to_vec(), vec![0u8; 4096]))
            .await
            .unwrap_err();
        assert!(matches!(err, PtreeError::EntryTooLarge { .. }));
    }

    #[tokio::test]
    async fn empty_flush_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = StreamWriter::new(Arc::clone(&store), &small_config()).unwrap();
        assert!(writer.flush().await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }
}
