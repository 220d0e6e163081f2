use std::sync::Arc;

use crate::common::TreeConfig;
use crate::error::{PtreeError, Result};
use crate::store::ChunkStore;
use crate::tree::builder::Builder;
use crate::tree::copy::{copy_all, copy_until};
use crate::tree::cursor::Cursor;
use crate::types::{Entry, Root, Span};

/// Edit function applied by a [`Mutation`]. Called once per existing entry
/// inside the span, or exactly once with `None` when the span holds no
/// entry; returns the replacement entries.
pub type EditFn<'f> = Box<dyn FnMut(Option<&Entry>) -> Vec<Entry> + Send + 'f>;

/// An edit over one span of a tree: delete by returning nothing, update by
/// returning a modified entry, insert by returning entries for the `None`
/// call.
///
/// The returned entries are trusted to be sorted and to fall inside the
/// span; the engine does not re-validate them entry-by-entry, but a
/// violation fails loudly at the builder's key-ordering check rather than
/// silently corrupting the output tree.
pub struct Mutation<'f> {
    pub span: Span,
    pub f: EditFn<'f>,
}

impl<'f> Mutation<'f> {
    pub fn new(
        span: Span,
        f: impl FnMut(Option<&Entry>) -> Vec<Entry> + Send + 'f,
    ) -> Self {
        Mutation {
            span,
            f: Box::new(f),
        }
    }

    /// Sets `key` to `value`, replacing any existing entry.
    pub fn put(key: &[u8], value: &[u8]) -> Mutation<'static> {
        let ent = Entry::new(key.to_vec(), value.to_vec());
        Mutation::new(Span::single(key), move |_| vec![ent.clone()])
    }

    /// Removes `key` if present.
    pub fn delete(key: &[u8]) -> Mutation<'static> {
        Mutation::new(Span::single(key), |_| Vec::new())
    }
}

impl std::fmt::Debug for Mutation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation").field("span", &self.span).finish()
    }
}

/// Applies `mutations` (in ascending, non-overlapping span order) to the
/// tree at `root`, returning the new root. Untouched subtrees are attached
/// to the output by reference, so the result shares every chunk of the
/// original outside the edited regions.
pub async fn mutate<S: ChunkStore>(
    store: Arc<S>,
    config: TreeConfig,
    root: Root,
    mutations: Vec<Mutation<'_>>,
) -> Result<Root> {
    let mut b = Builder::new(Arc::clone(&store), config)?;
    let mut it = Cursor::new(store, root, Span::total());

    let mut prev_last: Option<Option<Vec<u8>>> = None;
    for mut m in mutations {
        if let Some(prev) = &prev_last {
            match (prev, &m.span.first) {
                (None, _) => {
                    return Err(PtreeError::InvalidOperation(
                        "mutation follows a span with no upper bound".into(),
                    ));
                }
                (Some(_), None) => {
                    return Err(PtreeError::InvalidOperation(
                        "unbounded-below mutation must come first".into(),
                    ));
                }
                (Some(pl), Some(first)) if first < pl => {
                    return Err(PtreeError::InvalidOperation(
                        "mutation spans overlap or are out of order".into(),
                    ));
                }
                _ => {}
            }
        }

        if let Some(first) = m.span.first.as_deref() {
            copy_until(&mut b, &mut it, Some(first)).await?;
        }

        let mut applied = false;
        loop {
            let Some(ent) = it.peek_at(0).await? else {
                break;
            };
            if !m.span.contains(&ent.key) {
                break;
            }
            it.next_at(0).await?;
            applied = true;
            for out in (m.f)(Some(&ent)) {
                b.put(out.key, out.value).await?;
            }
        }
        if !applied {
            for out in (m.f)(None) {
                b.put(out.key, out.value).await?;
            }
        }
        prev_last = Some(m.span.last.clone());
    }

    copy_all(&mut b, &mut it).await?;
    b.finish().await
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

    fn key(i: u32) -> Vec<u8> {
        format!("{i:08}").into_bytes()
    }

    async fn build_tree(store: &Arc<InMemoryStore>, n: u32) -> Root {
        let mut b = Builder::new(Arc::clone(store), small_config()).unwrap();
        for i in 0..n {
            b.put(key(i), format!("v{i}").into_bytes()).await.unwrap();
        }
        b.finish().await.unwrap()
    }

    async fn entries_of(store: &Arc<InMemoryStore>, root: Root) -> Vec<Entry> {
        let mut cursor = Cursor::new(Arc::clone(store), root, Span::total());
        let mut out = Vec::new();
        while let Some(e) = cursor.next().await.unwrap() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn update_replaces_exactly_one_value() {
        let store = Arc::new(InMemoryStore::new());
        let root = build_tree(&store, 1000).await;
        let new_root = mutate(
            Arc::clone(&store),
            small_config(),
            root,
            vec![Mutation::put(&key(500), b"replaced")],
        )
        .await
        .unwrap();

        let got = entries_of(&store, new_root).await;
        assert_eq!(got.len(), 1000);
        for (i, e) in got.iter().enumerate() {
            assert_eq!(e.key, key(i as u32));
            if i == 500 {
                assert_eq!(e.value, b"replaced".to_vec());
            } else {
                assert_eq!(e.value, format!("v{i}").into_bytes());
            }
        }
    }

    #[tokio::test]
    async fn delete_removes_exactly_one_key() {
        let store = Arc::new(InMemoryStore::new());
        let root = build_tree(&store, 1000).await;
        let new_root = mutate(
            Arc::clone(&store),
            small_config(),
            root,
            vec![Mutation::delete(&key(321))],
        )
        .await
        .unwrap();

        let got = entries_of(&store, new_root).await;
        assert_eq!(got.len(), 999);
        for e in &got {
            assert_ne!(e.key, key(321));
        }
        // Neighbors are untouched.
        assert!(got.iter().any(|e| e.key == key(320)));
        assert!(got.iter().any(|e| e.key == key(322)));
    }

    #[tokio::test]
    async fn edit_fn_runs_once_with_none_when_span_is_empty() {
        let store = Arc::new(InMemoryStore::new());
        let root = build_tree(&store, 100).await;
        let mut calls = 0u32;
        let target = b"00000050x".to_vec();
        let new_root = mutate(
            Arc::clone(&store),
            small_config(),
            root,
            vec![Mutation::new(Span::single(&target), |existing| {
                calls += 1;
                assert!(existing.is_none());
                vec![Entry::new(b"00000050x".to_vec(), b"inserted".to_vec())]
            })],
        )
        .await
        .unwrap();
        assert_eq!(calls, 1);

        let got = entries_of(&store, new_root).await;
        assert_eq!(got.len(), 101);
        let pos = got.iter().position(|e| e.key == target).unwrap();
        assert_eq!(got[pos - 1].key, key(50));
        assert_eq!(got[pos + 1].key, key(51));
    }

    #[tokio::test]
    async fn multiple_mutations_apply_in_one_pass() {
        let store = Arc::new(InMemoryStore::new());
        let root = build_tree(&store, 500).await;
        let new_root = mutate(
            Arc::clone(&store),
            small_config(),
            root,
            vec![
                Mutation::delete(&key(10)),
                Mutation::put(&key(200), b"x"),
                Mutation::delete(&key(499)),
            ],
        )
        .await
        .unwrap();
        let got = entries_of(&store, new_root).await;
        assert_eq!(got.len(), 499);
        assert!(got.iter().all(|e| e.key != key(10) && e.key != key(499)));
        assert!(got.iter().any(|e| e.key == key(200) && e.value == b"x".to_vec()));
    }

    #[tokio::test]
    async fn out_of_order_mutations_are_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let root = build_tree(&store, 100).await;
        let err = mutate(
            Arc::clone(&store),
            small_config(),
            root,
            vec![Mutation::delete(&key(50)), Mutation::delete(&key(10))],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PtreeError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn range_delete_via_span_mutation() {
        let store = Arc::new(InMemoryStore::new());
        let root = build_tree(&store, 100).await;
        let span = Span {
            first: Some(key(10)),
            last: Some(key(20)),
        };
        let new_root = mutate(
            Arc::clone(&store),
            small_config(),
            root,
            vec![Mutation::new(span, |_| Vec::new())],
        )
        .await
        .unwrap();
        let got = entries_of(&store, new_root).await;
        assert_eq!(got.len(), 90);
        assert!(got.iter().all(|e| e.key < key(10) || e.key >= key(20)));
    }

    #[tokio::test]
    async fn mutating_an_empty_tree_inserts() {
        let store = Arc::new(InMemoryStore::new());
        let empty = Builder::new(Arc::clone(&store), small_config())
            .unwrap()
            .finish()
            .await
            .unwrap();
        let new_root = mutate(
            Arc::clone(&store),
            small_config(),
            empty,
            vec![Mutation::put(b"only", b"one")],
        )
        .await
        .unwrap();
        let got = entries_of(&store, new_root).await;
        assert_eq!(got, vec![Entry::new(b"only".to_vec(), b"one".to_vec())]);
    }
}
