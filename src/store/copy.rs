use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use super::chunk_store::ChunkStore;
use crate::error::{PtreeError, Result};

/// Copies every chunk from `src` to `dst` using `num_workers` concurrent
/// copiers. Blob copies are independent, so no ordering is preserved; the
/// first failure trips a shared flag that stops the remaining workers at
/// their next pickup. Returns the number of chunks copied.
pub async fn copy_all<S1, S2>(src: Arc<S1>, dst: Arc<S2>, num_workers: usize) -> Result<usize>
where
    S1: ChunkStore,
    S2: ChunkStore,
{
    let hashes = src.all_hashes().await?;
    let (tx, rx) = mpsc::channel(num_workers.max(1) * 2);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let failed = Arc::new(AtomicBool::new(false));

    let producer = {
        let failed = Arc::clone(&failed);
        tokio::spawn(async move {
            for hash in hashes {
                if failed.load(Ordering::Relaxed) || tx.send(hash).await.is_err() {
                    break;
                }
            }
        })
    };

    let mut workers = Vec::with_capacity(num_workers.max(1));
    for _ in 0..num_workers.max(1) {
        let src = Arc::clone(&src);
        let dst = Arc::clone(&dst);
        let rx = Arc::clone(&rx);
        let failed = Arc::clone(&failed);
        workers.push(tokio::spawn(async move {
            let mut copied = 0usize;
            loop {
                if failed.load(Ordering::Relaxed) {
                    return Ok(copied);
                }
                let job = { rx.lock().await.recv().await };
                let Some(hash) = job else {
                    return Ok(copied);
                };
                let result: Result<()> = async {
                    let bytes = src
                        .get(&hash)
                        .await?
                        .ok_or(PtreeError::ChunkNotFound(hash))?;
                    dst.put(bytes).await?;
                    Ok(())
                }
                .await;
                match result {
                    Ok(()) => copied += 1,
                    Err(err) => {
                        failed.store(true, Ordering::Relaxed);
                        return Err(err);
                    }
                }
            }
        }));
    }

    let mut copied = 0usize;
    let mut first_err = None;
    for worker in workers {
        match worker.await {
            Ok(Ok(n)) => copied += n,
            Ok(Err(err)) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
            Err(join) => {
                if first_err.is_none() {
                    first_err = Some(PtreeError::Internal(format!("copy worker panicked: {join}")));
                }
            }
        }
    }
    producer
        .await
        .map_err(|e| PtreeError::Internal(format!("copy producer panicked: {e}")))?;

    match first_err {
        Some(err) => Err(err),
        None => Ok(copied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem_store::InMemoryStore;

    #[tokio::test]
    async fn copies_every_chunk() {
        let src = Arc::new(InMemoryStore::new());
        let dst = Arc::new(InMemoryStore::new());
        let mut hashes = Vec::new();
        for i in 0..200u32 {
            hashes.push(src.put(i.to_le_bytes().to_vec()).await.unwrap());
        }
        let copied = copy_all(Arc::clone(&src), Arc::clone(&dst), 4).await.unwrap();
        assert_eq!(copied, 200);
        for hash in &hashes {
            assert!(dst.exists(hash).await.unwrap());
        }
    }

    #[tokio::test]
    async fn empty_source_copies_nothing() {
        let src = Arc::new(InMemoryStore::new());
        let dst = Arc::new(InMemoryStore::new());
        assert_eq!(copy_all(src, Arc::clone(&dst), 4).await.unwrap(), 0);
        assert!(dst.is_empty().await);
    }
}
