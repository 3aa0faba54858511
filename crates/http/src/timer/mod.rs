//! Idle-connection timers.
//!
//! The reactor keeps one timer per open connection, keyed by the connection id. Each I/O
//! activity pushes the expiry further into the future, and every loop iteration runs
//! [`HeapTimer::next_tick`] to fire what is overdue and to learn how long the next poll may
//! block.

mod heap_timer;

pub use heap_timer::HeapTimer;
pub use heap_timer::TimeoutCallback;
