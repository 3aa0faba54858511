use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, error};

/// A unit of work executed exactly once by some worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool size must be greater than zero")]
    ZeroWorkers,

    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        #[from]
        source: io::Error,
    },

    #[error("worker pool is closed")]
    Closed,
}

struct State {
    tasks: VecDeque<Task>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    not_empty: Condvar,
}

/// A fixed set of threads consuming a shared FIFO task queue.
///
/// Dropping the pool (or calling [`WorkerPool::shutdown`]) closes the queue and joins every
/// worker. Tasks that were queued before the close are still executed; tasks submitted
/// afterwards are rejected with [`PoolError::Closed`].
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool").field("workers", &self.workers.len()).finish_non_exhaustive()
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::ZeroWorkers);
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State { tasks: VecDeque::new(), closed: false }),
            not_empty: Condvar::new(),
        });

        let mut pool = Self { shared, workers: Vec::with_capacity(size) };
        for index in 0..size {
            let shared = Arc::clone(&pool.shared);
            // on spawn failure `pool` is dropped here, which joins the already running workers
            let handle = thread::Builder::new()
                .name(format!("micro-httpd-worker-{index}"))
                .spawn(move || work(&shared))?;
            pool.workers.push(handle);
        }

        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `task` and wakes one idle worker.
    pub fn add_task<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            state.tasks.push_back(Box::new(task));
        }
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Closes the queue, lets the workers drain it, and joins them.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
        }
        self.shared.not_empty.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if let Some(task) = state.tasks.pop_front() {
            // never hold the queue lock while a task runs
            drop(state);
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                error!("worker task panicked");
            }
            state = shared.state.lock();
        } else if state.closed {
            break;
        } else {
            shared.not_empty.wait(&mut state);
        }
    }
    debug!(worker = ?thread::current().name(), "worker exit");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn rejects_empty_pool() {
        assert!(matches!(WorkerPool::new(0), Err(PoolError::ZeroWorkers)));
    }

    #[test]
    fn concurrent_producers_run_each_task_once() {
        const PRODUCERS: usize = 4;
        const TASKS_PER_PRODUCER: usize = 500;

        let pool = Arc::new(WorkerPool::new(4).unwrap());
        let hits: Arc<Vec<AtomicUsize>> =
            Arc::new((0..PRODUCERS * TASKS_PER_PRODUCER).map(|_| AtomicUsize::new(0)).collect());
        let (done_tx, done_rx) = mpsc::channel();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let pool = Arc::clone(&pool);
                let hits = Arc::clone(&hits);
                let done_tx = done_tx.clone();
                thread::spawn(move || {
                    for t in 0..TASKS_PER_PRODUCER {
                        let hits = Arc::clone(&hits);
                        let done_tx = done_tx.clone();
                        pool.add_task(move || {
                            hits[p * TASKS_PER_PRODUCER + t].fetch_add(1, Ordering::SeqCst);
                            done_tx.send(()).unwrap();
                        })
                        .unwrap();
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        for _ in 0..PRODUCERS * TASKS_PER_PRODUCER {
            done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        }

        assert!(hits.iter().all(|hit| hit.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn shutdown_drains_queued_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(1).unwrap();

        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        pool.add_task(move || {
            gate_rx.recv().unwrap();
        })
        .unwrap();
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.add_task(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        gate_tx.send(()).unwrap();
        pool.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(matches!(pool.add_task(|| {}), Err(PoolError::Closed)));
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.add_task(|| panic!("boom")).unwrap();
        pool.add_task(move || tx.send(42).unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }
}
