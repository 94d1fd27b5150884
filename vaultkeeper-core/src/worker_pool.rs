//! A persistent worker pool with backpressure, shared by the Download
//! Pipeline and the Task Orchestrator.
//!
//! Spawns N tokio tasks that pull work items from a bounded
//! `async-channel`. Unlike a one-shot batch pool, `Enqueue` can append
//! work after the pool has started — the Download Pipeline is long-lived
//! across Tasks (§4.4) and needs that. Workers share a cloned `Receiver`
//! (cheap, no `Mutex`) rather than contending on one shared lock.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A long-lived pool of worker tasks processing items pulled from a
/// shared queue. `W` is the work item, `R` is the result.
pub struct WorkerPool<W: Send + 'static, R: Send + 'static> {
    work_tx: async_channel::Sender<W>,
    work_rx: async_channel::Receiver<W>,
    result_rx: mpsc::UnboundedReceiver<R>,
    stopped: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl<W: Send + 'static, R: Send + 'static> WorkerPool<W, R> {
    /// Spawn `n` workers that each call `process_fn` on the cancel flag and
    /// item. `process_fn` is responsible for checking `cancel` at its own
    /// suspension points (§5 "Cancellation").
    pub fn start<F, Fut>(n: usize, capacity: usize, process_fn: F) -> Self
    where
        F: Fn(W, Arc<AtomicBool>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (work_tx, work_rx) = async_channel::bounded::<W>(capacity.max(1));
        let (result_tx, result_rx) = mpsc::unbounded_channel::<R>();
        let process_fn = Arc::new(process_fn);
        let stopped = Arc::new(AtomicBool::new(false));

        let handles: Vec<JoinHandle<()>> = (0..n.max(1))
            .map(|_| {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let process_fn = process_fn.clone();
                let stopped = stopped.clone();
                tokio::spawn(async move {
                    while let Ok(item) = work_rx.recv().await {
                        if stopped.load(Ordering::Acquire) {
                            continue;
                        }
                        let result = process_fn(item, stopped.clone()).await;
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            work_tx,
            work_rx,
            result_rx,
            stopped,
            handles,
        }
    }

    /// Append work to the queue. Fails only once the pool has been
    /// stopped and the channel closed.
    pub async fn enqueue(&self, item: W) -> Result<(), W> {
        self.work_tx.send(item).await.map_err(|e| e.0)
    }

    /// Receive the next completed result.
    pub async fn recv(&mut self) -> Option<R> {
        self.result_rx.recv().await
    }

    /// Drain up to `n` results without blocking past what's already queued.
    pub async fn recv_n(&mut self, n: usize) -> Vec<R> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.result_rx.recv().await {
                Some(r) => out.push(r),
                None => break,
            }
        }
        out
    }

    /// Set the shared cancel flag, drain the queue, and close the work
    /// channel so workers exit once any in-flight item finishes (§4.4
    /// "Stop()").
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        while self.work_rx.try_recv().is_ok() {}
        self.work_tx.close();
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && !self.work_tx.is_closed()
    }
}

impl<W: Send + 'static, R: Send + 'static> Drop for WorkerPool<W, R> {
    fn drop(&mut self) {
        self.work_tx.close();
        for h in &self.handles {
            h.abort();
        }
    }
}
