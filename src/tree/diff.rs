use std::sync::Arc;

use crate::common::{Key, Value};
use crate::error::Result;
use crate::store::ChunkStore;
use crate::tree::cursor::Cursor;
use crate::types::{Root, Span};

/// One differing key between two trees. A side's value is `None` when the
/// key exists only on the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub key: Key,
    pub left_value: Option<Value>,
    pub right_value: Option<Value>,
}

/// Walks two trees in lockstep over a span, yielding exactly the keys whose
/// values differ or that exist on only one side.
///
/// When both sides sit at an index level and their next index entries are
/// byte-identical (same first key, same chunk reference), the shared subtree
/// is skipped without decoding it, since content addressing makes equal bytes
/// mean equal contents. With shared chunk structure the walk is proportional
/// to the differing region, not tree size.
#[derive(Debug)]
pub struct Differ<S: ChunkStore> {
    left: Cursor<S>,
    right: Cursor<S>,
    identical: bool,
}

impl<S: ChunkStore> Differ<S> {
    pub fn new(store: Arc<S>, left: Root, right: Root, span: Span) -> Self {
        let identical = left == right;
        Differ {
            left: Cursor::new(Arc::clone(&store), left, span.clone()),
            right: Cursor::new(store, right, span),
            identical,
        }
    }

    pub async fn next(&mut self) -> Result<Option<DiffEntry>> {
        if self.identical {
            return Ok(None);
        }
        loop {
            self.skip_identical_subtrees().await?;
            match (self.left.peek().await?, self.right.peek().await?) {
                (None, None) => return Ok(None),
                (Some(l), None) => {
                    self.left.next().await?;
                    return Ok(Some(DiffEntry {
                        key: l.key,
                        left_value: Some(l.value),
                        right_value: None,
                    }));
                }
                (None, Some(r)) => {
                    self.right.next().await?;
                    return Ok(Some(DiffEntry {
                        key: r.key,
                        left_value: None,
                        right_value: Some(r.value),
                    }));
                }
                (Some(l), Some(r)) => match l.key.cmp(&r.key) {
                    std::cmp::Ordering::Less => {
                        self.left.next().await?;
                        return Ok(Some(DiffEntry {
                            key: l.key,
                            left_value: Some(l.value),
                            right_value: None,
                        }));
                    }
                    std::cmp::Ordering::Greater => {
                        self.right.next().await?;
                        return Ok(Some(DiffEntry {
                            key: r.key,
                            left_value: None,
                            right_value: Some(r.value),
                        }));
                    }
                    std::cmp::Ordering::Equal => {
                        self.left.next().await?;
                        self.right.next().await?;
                        if l.value != r.value {
                            return Ok(Some(DiffEntry {
                                key: l.key,
                                left_value: Some(l.value),
                                right_value: Some(r.value),
                            }));
                        }
                    }
                },
            }
        }
    }

    /// Consumes matching index entries on both sides while they reference
    /// byte-identical subtrees.
    async fn skip_identical_subtrees(&mut self) -> Result<()> {
        loop {
            let ls = self.left.synced_below();
            let rs = self.right.synced_below();
            if ls == 0 || rs == 0 {
                return Ok(());
            }
            let level = ls.min(rs);
            let (Some(li), Some(ri)) = (
                self.left.peek_at(level).await?,
                self.right.peek_at(level).await?,
            ) else {
                return Ok(());
            };
            if li != ri {
                return Ok(());
            }
            self.left.next_at(level).await?;
            self.right.next_at(level).await?;
        }
    }
}

/// Collects every difference between `left` and `right` within `span`.
pub async fn diff<S: ChunkStore>(
    store: Arc<S>,
    left: Root,
    right: Root,
    span: Span,
) -> Result<Vec<DiffEntry>> {
    let mut differ = Differ::new(store, left, right, span);
    let mut out = Vec::new();
    while let Some(d) = differ.next().await? {
        out.push(d);
    }
    Ok(out)
}
