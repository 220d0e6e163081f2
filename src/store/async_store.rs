use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::chunk_store::ChunkStore;
use crate::common::{Hash, hash_bytes};
use crate::error::{PtreeError, Result};

/// A `ChunkStore` wrapper that pipelines `put` calls behind a bounded queue
/// serviced by a fixed worker pool.
///
/// `put` computes the content hash synchronously, enqueues the write, and
/// returns immediately, trading read-your-own-write consistency for
/// throughput: a `get` for a chunk still in the queue may miss. The first
/// worker failure is latched and surfaced by every subsequent `put` and by
/// [`AsyncStore::close`], which drains the queue and joins the workers.
#[derive(Debug)]
pub struct AsyncStore<S: ChunkStore> {
    inner: Arc<S>,
    tx: mpsc::Sender<Vec<u8>>,
    workers: Vec<JoinHandle<()>>,
    failed: Arc<Mutex<Option<String>>>,
}

impl<S: ChunkStore> AsyncStore<S> {
    pub fn new(inner: Arc<S>, queue_len: usize, num_workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(queue_len.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let failed = Arc::new(Mutex::new(None));

        let mut workers = Vec::with_capacity(num_workers.max(1));
        for _ in 0..num_workers.max(1) {
            let inner = Arc::clone(&inner);
            let rx = Arc::clone(&rx);
            let failed = Arc::clone(&failed);
            workers.push(tokio::spawn(async move {
                loop {
                    if failed.lock().unwrap().is_some() {
                        return;
                    }
                    let job = { rx.lock().await.recv().await };
                    match job {
                        None => return,
                        Some(bytes) => {
                            if let Err(err) = inner.put(bytes).await {
                                let mut slot = failed.lock().unwrap();
                                if slot.is_none() {
                                    *slot = Some(err.to_string());
                                }
                                return;
                            }
                        }
                    }
                }
            }));
        }
        AsyncStore {
            inner,
            tx,
            workers,
            failed,
        }
    }

    fn check_failed(&self) -> Result<()> {
        match self.failed.lock().unwrap().as_ref() {
            Some(msg) => Err(PtreeError::Storage(format!("deferred post failed: {msg}"))),
            None => Ok(()),
        }
    }

    /// Blocks until all outstanding posts are flushed, then reports any
    /// failure that occurred along the way.
    pub async fn close(self) -> Result<()> {
        let AsyncStore {
            tx,
            workers,
            failed,
            ..
        } = self;
        drop(tx);
        for worker in workers {
            worker
                .await
                .map_err(|e| PtreeError::Internal(format!("async store worker panicked: {e}")))?;
        }
        debug!("async store closed");
        match failed.lock().unwrap().take() {
            Some(msg) => Err(PtreeError::Storage(format!("deferred post failed: {msg}"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: ChunkStore> ChunkStore for AsyncStore<S> {
    async fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        self.inner.get(hash).await
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<Hash> {
        self.check_failed()?;
        let hash = hash_bytes(&bytes);
        self.tx
            .send(bytes)
            .await
            .map_err(|_| PtreeError::Storage("async store is closed".into()))?;
        Ok(hash)
    }

    async fn exists(&self, hash: &Hash) -> Result<bool> {
        self.inner.exists(hash).await
    }

    async fn delete_batch(&self, hashes: &[Hash]) -> Result<()> {
        self.inner.delete_batch(hashes).await
    }

    async fn all_hashes(&self) -> Result<Vec<Hash>> {
        self.inner.all_hashes().await
    }
}
