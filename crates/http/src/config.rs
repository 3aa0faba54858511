//! Server configuration.
//!
//! ```
//! use std::time::Duration;
//! use micro_httpd::config::ServerConfig;
//! use micro_httpd::server::TriggerMode;
//!
//! let config = ServerConfig::builder()
//!     .address("127.0.0.1:8080")
//!     .conn_trigger(TriggerMode::Level)
//!     .idle_timeout(Duration::from_secs(30))
//!     .worker_threads(4)
//!     .document_root("./resources")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.worker_threads(), 4);
//! ```

use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::codec::default_error_pages;
use crate::server::TriggerMode;

const DEFAULT_ADDRESS: &str = "127.0.0.1:1316";
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_WORKER_THREADS: usize = 6;
const DEFAULT_DOCUMENT_ROOT: &str = "./resources";
const DEFAULT_MAX_CONNECTIONS: usize = 65536;
const DEFAULT_MAX_EVENTS: usize = 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },

    #[error("address must be set")]
    MissingAddress,

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    addresses: Vec<SocketAddr>,
    listen_trigger: TriggerMode,
    conn_trigger: TriggerMode,
    idle_timeout: Duration,
    worker_threads: usize,
    document_root: PathBuf,
    max_connections: usize,
    max_events: usize,
    error_pages: HashMap<StatusCode, String>,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Addresses tried in order when binding the listener.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    pub fn listen_trigger(&self) -> TriggerMode {
        self.listen_trigger
    }

    pub fn conn_trigger(&self) -> TriggerMode {
        self.conn_trigger
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn error_pages(&self) -> &HashMap<StatusCode, String> {
        &self.error_pages
    }
}

#[derive(Debug)]
pub struct ServerConfigBuilder {
    addresses: Result<Vec<SocketAddr>, ConfigError>,
    listen_trigger: TriggerMode,
    conn_trigger: TriggerMode,
    idle_timeout: Duration,
    worker_threads: usize,
    document_root: PathBuf,
    max_connections: usize,
    max_events: usize,
    error_pages: HashMap<StatusCode, String>,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        Self {
            addresses: Ok(Vec::new()),
            listen_trigger: TriggerMode::Edge,
            conn_trigger: TriggerMode::Edge,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            worker_threads: DEFAULT_WORKER_THREADS,
            document_root: PathBuf::from(DEFAULT_DOCUMENT_ROOT),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_events: DEFAULT_MAX_EVENTS,
            error_pages: default_error_pages(),
        }
    }

    /// Resolves `address` now; a resolution failure is reported by [`ServerConfigBuilder::build`].
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.addresses = resolve(address);
        self
    }

    /// Sets both trigger modes from the classic 0-3 code: bit 1 makes the listener
    /// edge-triggered, bit 0 the connections.
    pub fn trigger_mode(mut self, code: u8) -> Self {
        let mode = |edge: bool| if edge { TriggerMode::Edge } else { TriggerMode::Level };
        self.listen_trigger = mode(code & 0b10 != 0);
        self.conn_trigger = mode(code & 0b01 != 0);
        self
    }

    pub fn listen_trigger(mut self, mode: TriggerMode) -> Self {
        self.listen_trigger = mode;
        self
    }

    pub fn conn_trigger(mut self, mode: TriggerMode) -> Self {
        self.conn_trigger = mode;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn document_root<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.document_root = dir.into();
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Serves `page` (relative to the document root) for responses with `status`.
    pub fn error_page<S: Into<String>>(mut self, status: StatusCode, page: S) -> Self {
        self.error_pages.insert(status, page.into());
        self
    }

    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let mut addresses = self.addresses?;
        if addresses.is_empty() {
            addresses = resolve(DEFAULT_ADDRESS)?;
        }
        if addresses.is_empty() {
            return Err(ConfigError::MissingAddress);
        }

        for (name, value) in [
            ("worker_threads", self.worker_threads),
            ("max_connections", self.max_connections),
            ("max_events", self.max_events),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Zero { name: "idle_timeout" });
        }

        Ok(ServerConfig {
            addresses,
            listen_trigger: self.listen_trigger,
            conn_trigger: self.conn_trigger,
            idle_timeout: self.idle_timeout,
            worker_threads: self.worker_threads,
            document_root: self.document_root,
            max_connections: self.max_connections,
            max_events: self.max_events,
            error_pages: self.error_pages,
        })
    }
}

fn resolve<A: ToSocketAddrs>(address: A) -> Result<Vec<SocketAddr>, ConfigError> {
    address
        .to_socket_addrs()
        .map(Iterator::collect)
        .map_err(|e| ConfigError::InvalidAddress { reason: e.to_string() })
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::builder().build().unwrap();

        assert_eq!(config.addresses(), &["127.0.0.1:1316".parse::<SocketAddr>().unwrap()]);
        assert_eq!(config.listen_trigger(), TriggerMode::Edge);
        assert_eq!(config.conn_trigger(), TriggerMode::Edge);
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.worker_threads(), 6);
        assert_eq!(config.document_root(), Path::new("./resources"));
        assert_eq!(config.max_connections(), 65536);
        assert_eq!(config.error_pages().get(&StatusCode::NOT_FOUND).map(String::as_str), Some("/404.html"));
    }

    #[test]
    fn trigger_mode_codes() {
        let modes = |code| {
            let config = ServerConfig::builder().trigger_mode(code).build().unwrap();
            (config.listen_trigger(), config.conn_trigger())
        };

        assert_eq!(modes(0), (TriggerMode::Level, TriggerMode::Level));
        assert_eq!(modes(1), (TriggerMode::Level, TriggerMode::Edge));
        assert_eq!(modes(2), (TriggerMode::Edge, TriggerMode::Level));
        assert_eq!(modes(3), (TriggerMode::Edge, TriggerMode::Edge));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let result = ServerConfig::builder().address("not an address").build();
        assert!(matches!(result, Err(ConfigError::InvalidAddress { .. })));

        let result = ServerConfig::builder().worker_threads(0).build();
        assert!(matches!(result, Err(ConfigError::Zero { name: "worker_threads" })));

        assert!(matches!(ServerConfig::builder().idle_timeout(Duration::ZERO).build(), Err(ConfigError::Zero { .. })));
    }

    #[test]
    fn custom_error_page() {
        let config = ServerConfig::builder().error_page(StatusCode::NOT_FOUND, "/missing.html").build().unwrap();
        assert_eq!(config.error_pages().get(&StatusCode::NOT_FOUND).map(String::as_str), Some("/missing.html"));
    }
}
