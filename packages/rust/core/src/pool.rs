//! Shared bounded worker pool.
//!
//! Every fan-out stage (file extraction, scoring, field enrichment, parent
//! assignment) runs its work here, so the concurrency limit is configured
//! once and shared. A stage starts at most `size` worker tasks that drain
//! one queue of inputs; the pool-wide semaphore caps how many jobs run at
//! once across stages that share the pool.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

/// A fixed number of workers over the tokio runtime.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

/// Inputs of one [`WorkerPool::map_unordered`] call, handed out by index.
struct Queue<I> {
    inputs: Vec<I>,
    next: AtomicUsize,
}

impl<I> Queue<I> {
    fn take(&self) -> Option<usize> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed);
        (idx < self.inputs.len()).then_some(idx)
    }

    fn is_drained(&self) -> bool {
        self.next.load(Ordering::Relaxed) >= self.inputs.len()
    }
}

impl WorkerPool {
    /// A pool of `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Apply `f` to every input on the pool and wait for all of them.
    ///
    /// Results arrive in completion order, not input order. An input whose
    /// job panicked is replaced by `fallback(input)`, so the output always
    /// has one entry per input; the worker lost to the panic is replaced
    /// while inputs remain. `on_complete` is called with the running count
    /// after each result.
    pub async fn map_unordered<I, T, F, Fut>(
        &self,
        inputs: Vec<I>,
        f: F,
        fallback: impl Fn(&I) -> T,
        mut on_complete: impl FnMut(usize),
    ) -> Vec<T>
    where
        I: Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(&I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let total = inputs.len();
        let queue = Arc::new(Queue {
            inputs,
            next: AtomicUsize::new(0),
        });
        let f = Arc::new(f);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for _ in 0..self.size.min(total) {
            workers.spawn(drain(
                queue.clone(),
                f.clone(),
                self.permits.clone(),
                tx.clone(),
            ));
        }
        tracing::trace!(workers = workers.len(), inputs = total, "pool stage started");

        let mut finished = vec![false; total];
        let mut results = Vec::with_capacity(total);
        while !workers.is_empty() {
            tokio::select! {
                Some((idx, value)) = rx.recv() => {
                    finished[idx] = true;
                    results.push(value);
                    on_complete(results.len());
                }
                Some(joined) = workers.join_next() => {
                    if let Err(e) = joined {
                        tracing::warn!(error = %e, "pool worker failed");
                        if !queue.is_drained() {
                            workers.spawn(drain(
                                queue.clone(),
                                f.clone(),
                                self.permits.clone(),
                                tx.clone(),
                            ));
                        }
                    }
                }
            }
        }

        // Every worker has exited; collect what they sent last.
        drop(tx);
        while let Some((idx, value)) = rx.recv().await {
            finished[idx] = true;
            results.push(value);
            on_complete(results.len());
        }

        for (input, _) in queue
            .inputs
            .iter()
            .zip(&finished)
            .filter(|(_, finished)| !**finished)
        {
            results.push(fallback(input));
            on_complete(results.len());
        }
        results
    }
}

/// One worker: take inputs until the queue is empty.
async fn drain<I, T, F, Fut>(
    queue: Arc<Queue<I>>,
    f: Arc<F>,
    permits: Arc<Semaphore>,
    results: mpsc::UnboundedSender<(usize, T)>,
) where
    F: Fn(&I) -> Fut,
    Fut: Future<Output = T>,
{
    while let Some(idx) = queue.take() {
        // The semaphore is never closed, so acquisition only fails if it is.
        let _permit = permits.acquire().await.ok();
        let job = f(&queue.inputs[idx]);
        let value = job.await;
        if results.send((idx, value)).is_err() {
            break;
        }
    }
}
