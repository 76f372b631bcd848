//! Task Queue & Worker Pool
//!
//! A fixed pool of OS threads servicing one shared blocking FIFO. Decode
//! work produced by the asset pipeline is pushed here as boxed closures;
//! completion is observed through atomics owned by the producer, never by
//! joining threads (workers must stay available for unrelated loads).
//!
//! # Shutdown
//!
//! Queue items are `Option<Task>`; `None` is a shutdown sentinel consumed
//! by exactly one worker. Dropping the pool pushes one sentinel per worker
//! and joins every thread.
//!
//! # Failure semantics
//!
//! The pool does not catch panics. Tasks that can fail are expected to
//! resolve their own `Result` (log and fall back) before returning, so a
//! failed decode never takes the pool down with it.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

/// A unit of work executed on a worker thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Thread-safe blocking FIFO, multi-producer multi-consumer.
pub struct TaskQueue<T> {
    tx: flume::Sender<T>,
    rx: flume::Receiver<T>,
}

impl<T> TaskQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// Enqueues an item and wakes one waiting consumer.
    pub fn push(&self, item: T) {
        // The queue owns both ends, so the channel cannot be disconnected.
        let _ = self.tx.send(item);
    }

    /// Blocks until an item is available, then returns it in FIFO order.
    pub fn pop(&self) -> T {
        self.rx
            .recv()
            .expect("task queue holds its own sender; channel cannot disconnect")
    }

    /// Non-blocking pop; returns `None` when the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of workers used by [`WorkerPool::new`]: one thread per available
/// core minus the coordinating thread, never less than one.
#[must_use]
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1)
}

/// Fixed set of worker threads looping pop-and-execute on a shared
/// [`TaskQueue`].
pub struct WorkerPool {
    queue: Arc<TaskQueue<Option<Task>>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_workers(default_worker_count())
    }

    /// Creates a pool with an explicit worker count (at least one).
    #[must_use]
    pub fn with_workers(count: usize) -> Self {
        let queue: Arc<TaskQueue<Option<Task>>> = Arc::new(TaskQueue::new());
        let count = count.max(1);

        let mut workers = Vec::with_capacity(count);
        for i in 0..count {
            let queue = Arc::clone(&queue);
            let handle = thread::Builder::new()
                .name(format!("talos-worker-{i}"))
                .spawn(move || {
                    while let Some(task) = queue.pop() {
                        task();
                    }
                })
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        Self { queue, workers }
    }

    /// Submits a task; it will run to completion on some worker thread.
    pub fn push<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Some(Box::new(task)));
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // One sentinel per worker; each is consumed by exactly one thread.
        for _ in 0..self.workers.len() {
            self.queue.push(None);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn queue_is_fifo_for_single_consumer() {
        let queue = TaskQueue::new();
        for i in 0..10 {
            queue.push(i);
        }
        for i in 0..10 {
            assert_eq!(queue.pop(), i);
        }
    }

    #[test]
    fn try_pop_on_empty_returns_none() {
        let queue: TaskQueue<u32> = TaskQueue::new();
        assert!(queue.try_pop().is_none());
        queue.push(7);
        assert_eq!(queue.try_pop(), Some(7));
    }

    #[test]
    fn pool_executes_all_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::with_workers(4);
            for _ in 0..100 {
                let counter = Arc::clone(&counter);
                pool.push(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
            // Drop joins the workers, so every task has run afterwards.
        }
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn pool_shutdown_drains_pending_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::with_workers(1);
            for _ in 0..20 {
                let counter = Arc::clone(&counter);
                pool.push(move || {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        // The sentinel is pushed behind the queued work, so nothing is lost.
        assert_eq!(counter.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn default_worker_count_is_at_least_one() {
        assert!(default_worker_count() >= 1);
    }
}
