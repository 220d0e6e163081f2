use std::sync::Arc;

use crate::common::{TreeConfig, Value};
use crate::error::Result;
use crate::store::ChunkStore;
use crate::tree::builder::Builder;
use crate::tree::cursor::Cursor;
use crate::tree::diff::{self, DiffEntry};
use crate::tree::merge;
use crate::tree::mutate::{self, Mutation};
use crate::types::{Root, Span};

/// Handle bundling a chunk store with a validated tree configuration.
///
/// Trees themselves are immutable values identified by a [`Root`]; every
/// write operation takes a root and returns a new one, sharing unchanged
/// chunks with the original. The handle holds no root of its own; naming
/// and swapping roots (branches, staging) is the caller's concern.
#[derive(Debug, Clone)]
pub struct Ptree<S: ChunkStore> {
    store: Arc<S>,
    config: TreeConfig,
}

impl<S: ChunkStore> Ptree<S> {
    pub fn new(store: Arc<S>, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Ptree { store, config })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// A builder for writing a new tree from sorted puts.
    pub fn builder(&self) -> Result<Builder<S>> {
        Builder::new(Arc::clone(&self.store), self.config)
    }

    /// A cursor over the entries of `root` within `span`.
    pub fn cursor(&self, root: Root, span: Span) -> Cursor<S> {
        Cursor::new(Arc::clone(&self.store), root, span)
    }

    /// The root of a tree with no entries.
    pub async fn new_empty(&self) -> Result<Root> {
        self.builder()?.finish().await
    }

    /// Looks up a single key.
    pub async fn get(&self, root: Root, key: &[u8]) -> Result<Option<Value>> {
        let mut cursor = self.cursor(root, Span::single(key));
        Ok(cursor.next().await?.map(|e| e.value))
    }

    /// Sets `key` to `value`, returning the new root.
    pub async fn put(&self, root: Root, key: &[u8], value: &[u8]) -> Result<Root> {
        self.mutate(root, vec![Mutation::put(key, value)]).await
    }

    /// Removes `key` if present, returning the new root.
    pub async fn delete(&self, root: Root, key: &[u8]) -> Result<Root> {
        self.mutate(root, vec![Mutation::delete(key)]).await
    }

    /// Applies mutations in ascending span order; see [`mutate::mutate`].
    pub async fn mutate(&self, root: Root, mutations: Vec<Mutation<'_>>) -> Result<Root> {
        mutate::mutate(Arc::clone(&self.store), self.config, root, mutations).await
    }

    /// Folds several trees into one; earlier roots win duplicate keys.
    pub async fn merge(&self, roots: &[Root]) -> Result<Root> {
        merge::merge(Arc::clone(&self.store), self.config, roots, Span::total()).await
    }

    /// Every difference between `left` and `right` within `span`.
    pub async fn diff(&self, left: Root, right: Root, span: Span) -> Result<Vec<DiffEntry>> {
        diff::diff(Arc::clone(&self.store), left, right, span).await
    }
}
