//! Persistent ordered key/value trees over a content-addressed chunk store.
//!
//! Entries are encoded into content-defined chunks, chunks are posted to a
//! [`store::ChunkStore`] under their Blake3 hash, and index levels stack on
//! top until a single chunk reference, the [`types::Root`], identifies the
//! whole tree. Roots are immutable: edits, merges and deletions produce a
//! new root that shares every untouched chunk with the old one.
//!
//! The write path is [`tree::Builder`] (sorted puts in, root out); the read
//! path is [`tree::Cursor`] (root + [`types::Span`] in, ordered entries
//! out); [`tree::mutate`] edits a span copy-on-write; [`tree::Merger`] and
//! [`tree::Differ`] combine and compare trees. [`tree::Ptree`] bundles a
//! store and configuration behind single-key conveniences.

pub mod chunker;
pub mod common;
pub mod error;
pub mod gc;
pub mod store;
pub mod stream;
pub mod tree;
pub mod types;
pub mod upload;

pub use common::{Hash, Key, TreeConfig, Value};
pub use error::{PtreeError, Result};
pub use store::{AsyncStore, ChunkStore, InMemoryStore, copy_all};
pub use tree::{Builder, Cursor, DiffEntry, Differ, Merger, Mutation, Ptree, diff, merge, mutate};
pub use types::{Entry, Index, Root, Span, key_after, prefix_end};
pub use upload::Uploader;
