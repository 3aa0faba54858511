//! A micro HTTP/1.1 static file server core
//!
//! This crate serves files below a document root to many concurrent, mostly short-lived
//! connections using a fixed number of threads and non-blocking sockets. One reactor thread
//! waits for readiness with Linux `epoll`; request parsing and response building run on a fixed
//! worker pool; idle connections are evicted by an indexed timer heap.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 requests with `Content-Length` bodies
//! - Keep-alive connections and pipelined requests
//! - Level- or edge-triggered readiness, configurable for the listener and the connections
//! - Zero-copy file delivery through read-only memory mappings and vectored writes
//! - Url-encoded login and registration forms checked against a pluggable [`handler::UserStore`]
//! - Idle-connection eviction
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::thread;
//! use tracing::{error, Level};
//! use tracing_subscriber::FmtSubscriber;
//! use micro_httpd::config::ServerConfig;
//! use micro_httpd::handler::MemoryUserStore;
//! use micro_httpd::server::Reactor;
//!
//! let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//! tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//! let config = ServerConfig::builder().address("127.0.0.1:1316").document_root("./resources").build().unwrap();
//! let mut reactor = match Reactor::new(config, Arc::new(MemoryUserStore::new())) {
//!     Ok(reactor) => reactor,
//!     Err(e) => {
//!         error!(cause = %e, "bind server error");
//!         return;
//!     }
//! };
//!
//! let shutdown = reactor.shutdown_handle();
//! let server = thread::spawn(move || reactor.run());
//! // ... later
//! shutdown.shutdown();
//! server.join().unwrap().unwrap();
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`buffer`]: growable byte buffer with read and write cursors
//! - [`timer`]: indexed min-heap of timeouts
//! - [`pool`]: fixed-size worker pool
//! - [`protocol`]: request, form, payload and error types
//! - [`codec`]: request parsing and response building
//! - [`static_files`]: document root access
//! - [`handler`]: per-request work and the credential seam
//! - [`connection`]: per-client state and I/O
//! - [`server`]: the notifier and the reactor
//! - [`config`]: server configuration
//!
//! # Error Handling
//!
//! - [`protocol::ParseError`]: malformed requests, answered with 400 and a closed connection
//! - [`protocol::SendError`]: failures while sending, the connection is closed
//! - [`server::ServerError`]: setup failures returned from [`server::Reactor::new`]
//!
//! # Limitations
//!
//! - Linux only (`epoll`, `eventfd`)
//! - No TLS, no HTTP/2, no chunked transfer encoding
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64
//! - Maximum body size: 1MB

pub mod buffer;
pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod static_files;
pub mod timer;

mod utils;
pub(crate) use utils::ensure;
