pub mod builder;
mod copy;
pub mod cursor;
pub mod diff;
pub mod merge;
pub mod mutate;
pub mod ptree;

pub use builder::Builder;
pub use cursor::Cursor;
pub use diff::{DiffEntry, Differ, diff};
pub use merge::{Merger, merge};
pub use mutate::{EditFn, Mutation, mutate};
pub use ptree::Ptree;
