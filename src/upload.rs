use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::common::Hash;
use crate::error::{PtreeError, Result};
use crate::store::ChunkStore;

/// Fan-out pipeline that hashes and posts chunks concurrently while
/// preserving submission order for the caller.
///
/// `submit` hands a chunk to one of N workers; `next_ref` yields the
/// resulting references strictly in the order chunks were submitted, even
/// though the posts complete out of order across workers: each submission
/// carries a single-use response channel, and responses are collected FIFO.
/// That ordering is what lets a caller feed the references into index
/// structures that require increasing-key order.
#[derive(Debug)]
pub struct Uploader {
    tx: mpsc::Sender<(Vec<u8>, oneshot::Sender<Result<Hash>>)>,
    pending: VecDeque<oneshot::Receiver<Result<Hash>>>,
    workers: Vec<JoinHandle<()>>,
}

impl Uploader {
    pub fn new<S: ChunkStore>(store: Arc<S>, num_workers: usize, queue_len: usize) -> Self {
        let (tx, rx) = mpsc::channel::<(Vec<u8>, oneshot::Sender<Result<Hash>>)>(queue_len.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let mut workers = Vec::with_capacity(num_workers.max(1));
        for _ in 0..num_workers.max(1) {
            let store = Arc::clone(&store);
            let rx = Arc::clone(&rx);
            workers.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some((chunk, reply)) = job else {
                        return;
                    };
                    let result = store.put(chunk).await;
                    // The receiver may have been dropped; that only loses
                    // the reply, not the post.
                    let _ = reply.send(result);
                }
            }));
        }
        Uploader {
            tx,
            pending: VecDeque::new(),
            workers,
        }
    }

    /// Enqueues a chunk for posting. Applies backpressure once the queue is
    /// full.
    pub async fn submit(&mut self, chunk: Vec<u8>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((chunk, reply_tx))
            .await
            .map_err(|_| PtreeError::Storage("uploader is closed".into()))?;
        self.pending.push_back(reply_rx);
        Ok(())
    }

    /// Number of submissions whose references have not been collected yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The reference for the oldest uncollected submission, or `None` when
    /// every submission has been collected.
    pub async fn next_ref(&mut self) -> Option<Result<Hash>> {
        let rx = self.pending.pop_front()?;
        Some(rx.await.unwrap_or_else(|_| {
            Err(PtreeError::Internal("upload worker dropped a reply".into()))
        }))
    }

    /// Drains every outstanding submission in order and shuts the pool down.
    pub async fn finish(mut self) -> Result<Vec<Hash>> {
        drop(self.tx);
        let mut refs = Vec::with_capacity(self.pending.len());
        while let Some(rx) = self.pending.pop_front() {
            let hash = rx.await.unwrap_or_else(|_| {
                Err(PtreeError::Internal("upload worker dropped a reply".into()))
            })?;
            refs.push(hash);
        }
        for worker in self.workers {
            worker
                .await
                .map_err(|e| PtreeError::Internal(format!("upload worker panicked: {e}")))?;
        }
        Ok(refs)
    }
}
