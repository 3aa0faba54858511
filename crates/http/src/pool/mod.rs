//! Fixed-size worker pool.
//!
//! The reactor thread never runs request processing itself: it moves a connection into a
//! [`Task`] and hands it to the [`WorkerPool`], which runs it on one of its threads.

mod worker_pool;

pub use worker_pool::PoolError;
pub use worker_pool::Task;
pub use worker_pool::WorkerPool;
