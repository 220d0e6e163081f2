//! Structural copy between a cursor and a builder.
//!
//! Copying proceeds at the highest level on which both sides are synced:
//! whole subtrees move as single index entries, without re-reading or
//! re-encoding their contents. Only the chunks overlapping a bound are
//! descended into, so copying around a small span of a large tree touches
//! O(depth) chunks, not O(tree).

use crate::error::Result;
use crate::store::ChunkStore;
use crate::tree::builder::Builder;
use crate::tree::cursor::Cursor;

/// Copies entries from `it` into `b` while their keys are strictly below
/// `end`; `None` copies everything remaining.
pub(crate) async fn copy_until<S: ChunkStore>(
    b: &mut Builder<S>,
    it: &mut Cursor<S>,
    end: Option<&[u8]>,
) -> Result<()> {
    loop {
        let level = b.synced_below().min(it.synced_below());
        if level == 0 {
            match it.peek_at(0).await? {
                Some(ent) if end.map_or(true, |e| ent.key.as_slice() < e) => {
                    it.next_at(0).await?;
                    b.put_at(0, ent).await?;
                }
                _ => return Ok(()),
            }
        } else {
            let Some(head) = it.peek_at(level).await? else {
                return Ok(());
            };
            if let Some(e) = end {
                if head.key.as_slice() >= e {
                    return Ok(());
                }
            }
            // The subtree is safe to move whole when everything in it is
            // below the bound, i.e. the next subtree starts at or below it.
            let within = match (end, it.next_boundary(level).await?) {
                (None, _) => true,
                (Some(e), Some(bound)) => bound.as_slice() <= e,
                (Some(_), None) => false,
            };
            if within {
                it.next_at(level).await?;
                b.put_at(level, head).await?;
            } else {
                // Overlaps the bound: descend one level and keep copying.
                it.peek_at(level - 1).await?;
            }
        }
    }
}

/// Copies everything remaining in `it` into `b`.
pub(crate) async fn copy_all<S: ChunkStore>(b: &mut Builder<S>, it: &mut Cursor<S>) -> Result<()> {
    copy_until(b, it, None).await
}
