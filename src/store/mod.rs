pub mod async_store;
pub mod chunk_store;
pub mod copy;
pub mod mem_store;

pub use async_store::AsyncStore;
pub use chunk_store::ChunkStore;
pub use copy::copy_all;
pub use mem_store::InMemoryStore;
