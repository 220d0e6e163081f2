use std::sync::Arc;

use crate::common::TreeConfig;
use crate::error::Result;
use crate::store::ChunkStore;
use crate::tree::builder::Builder;
use crate::tree::cursor::Cursor;
use crate::types::{Entry, Root, Span};

/// K-way merge of sorted entry streams into one sorted, deduplicated stream.
///
/// At each step the lexicographically smallest head key wins; on ties the
/// **first listed input wins**, and every other input holding that key is
/// advanced past it. Callers therefore order inputs so the authoritative
/// source comes first.
#[derive(Debug)]
pub struct Merger<S: ChunkStore> {
    inputs: Vec<Cursor<S>>,
}

impl<S: ChunkStore> Merger<S> {
    pub fn new(inputs: Vec<Cursor<S>>) -> Self {
        Merger { inputs }
    }

    /// Returns the next merged entry, or `None` when every input is
    /// exhausted. Output keys are strictly increasing.
    pub async fn next(&mut self) -> Result<Option<Entry>> {
        let mut winner: Option<usize> = None;
        let mut best: Option<Entry> = None;
        for i in 0..self.inputs.len() {
            if let Some(ent) = self.inputs[i].peek().await? {
                let better = match &best {
                    None => true,
                    Some(b) => ent.key < b.key,
                };
                if better {
                    winner = Some(i);
                    best = Some(ent);
                }
            }
        }
        let (Some(i), Some(ent)) = (winner, best) else {
            return Ok(None);
        };
        self.inputs[i].next().await?;
        // Drop stale entries for the emitted key from every other input.
        for (j, input) in self.inputs.iter_mut().enumerate() {
            if j == i {
                continue;
            }
            while let Some(other) = input.peek().await? {
                if other.key.as_slice() <= ent.key.as_slice() {
                    input.next().await?;
                } else {
                    break;
                }
            }
        }
        Ok(Some(ent))
    }
}

/// Merges the trees at `roots` into a single tree over `span`. Duplicate
/// keys resolve to the value from the earliest root in the slice.
pub async fn merge<S: ChunkStore>(
    store: Arc<S>,
    config: TreeConfig,
    roots: &[Root],
    span: Span,
) -> Result<Root> {
    let inputs = roots
        .iter()
        .map(|root| Cursor::new(Arc::clone(&store), *root, span.clone()))
        .collect();
    let mut merger = Merger::new(inputs);
    let mut b = Builder::new(store, config)?;
    while let Some(ent) = merger.next().await? {
        b.put(ent.key, ent.value).await?;
    }
    b.finish().await
}
