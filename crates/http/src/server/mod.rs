//! Readiness-driven server core.
//!
//! - [`Notifier`]: epoll registrations, level- or edge-triggered, plus the [`Waker`] workers use
//!   to interrupt a wait.
//! - [`Reactor`]: accepts connections, drives their reads and writes, hands parsing to the
//!   worker pool and evicts idle connections.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use micro_httpd::config::ServerConfig;
//! use micro_httpd::handler::MemoryUserStore;
//! use micro_httpd::server::Reactor;
//!
//! let config = ServerConfig::builder().address("127.0.0.1:1316").document_root("./resources").build().unwrap();
//! let mut reactor = Reactor::new(config, Arc::new(MemoryUserStore::new())).unwrap();
//! reactor.run().unwrap();
//! ```

use std::io;

use thiserror::Error;

use crate::pool::PoolError;

mod notifier;
mod reactor;

pub use notifier::{Event, Interest, Notifier, TriggerMode, Waker};
pub use reactor::{Reactor, ShutdownHandle};

/// Fatal errors while setting up or running the reactor.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("failed to create notifier: {source}")]
    Notifier { source: io::Error },

    #[error("failed to create waker: {source}")]
    Waker { source: io::Error },

    #[error("worker pool error: {source}")]
    Pool {
        #[from]
        source: PoolError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
