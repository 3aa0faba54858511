//! The event loop.
//!
//! A single reactor thread owns the listener, the [`Notifier`], the idle [`HeapTimer`] and the
//! table of live connections. Its only blocking call is [`Notifier::wait`], bounded by the
//! next timer deadline.
//!
//! # Connection ownership
//!
//! When a connection has bytes to parse it is moved into a task on the [`WorkerPool`]; the
//! table keeps an in-flight marker in its place. The task hands the connection back over a
//! channel and wakes the reactor through the [`Waker`]. Connection sockets are registered
//! one-shot, so no readiness event is reported for a connection while a worker owns it.
//!
//! The idle timer is stopped while a worker owns a connection and restarted when it is handed
//! back, so a slow task never counts as idle time. Closing an in-flight connection (shutdown, or
//! an expiry that was already queued) only flips its marker; the connection is dropped when the
//! worker hands it back.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

use crate::codec::ResponseBuilder;
use crate::config::ServerConfig;
use crate::connection::{HttpConnection, ProcessOutcome, ReadStatus, WriteStatus};
use crate::handler::{RequestHandler, UserStore};
use crate::pool::WorkerPool;
use crate::server::notifier::{Interest, Notifier, TriggerMode, Waker};
use crate::server::ServerError;
use crate::static_files::StaticRoot;
use crate::timer::HeapTimer;

const LISTENER_TOKEN: u64 = 0;
const WAKER_TOKEN: u64 = 1;
const FIRST_CONNECTION_ID: u64 = 2;

const BUSY_MESSAGE: &[u8] = b"Server busy!";

enum Slot {
    Idle(Box<HttpConnection>),
    InFlight { fd: RawFd, closed: bool },
}

enum Outcome {
    Processed(ProcessOutcome),
    Failed,
}

struct Completion {
    id: u64,
    connection: Box<HttpConnection>,
    outcome: Outcome,
}

/// Stops a running [`Reactor`] from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    waker: Waker,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            error!(cause = %e, "failed to wake reactor for shutdown");
        }
    }
}

pub struct Reactor {
    config: ServerConfig,
    listener: TcpListener,
    notifier: Notifier,
    waker: Waker,
    timer: HeapTimer<u64>,
    pool: WorkerPool,
    handler: Arc<RequestHandler>,
    connections: HashMap<u64, Slot>,
    next_id: u64,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
    expired_tx: Sender<u64>,
    expired_rx: Receiver<u64>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("listener", &self.listener)
            .field("connections", &self.connections.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Reactor {
    /// Binds the listener and sets up the notifier, waker and worker pool.
    pub fn new(config: ServerConfig, user_store: Arc<dyn UserStore>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.addresses())
            .map_err(|source| ServerError::Bind { address: format!("{:?}", config.addresses()), source })?;
        listener.set_nonblocking(true)?;

        let notifier = Notifier::new(config.max_events()).map_err(|source| ServerError::Notifier { source })?;
        let waker = Waker::new().map_err(|source| ServerError::Waker { source })?;
        notifier.add(listener.as_raw_fd(), LISTENER_TOKEN, Interest::READABLE, config.listen_trigger())?;
        notifier.add(waker.as_raw_fd(), WAKER_TOKEN, Interest::READABLE, TriggerMode::Level)?;

        let pool = WorkerPool::new(config.worker_threads())?;

        let builder = ResponseBuilder::new(StaticRoot::new(config.document_root()), config.error_pages().clone());
        let handler = Arc::new(RequestHandler::new(builder, user_store));

        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        let (expired_tx, expired_rx) = crossbeam_channel::unbounded();

        Ok(Self {
            config,
            listener,
            notifier,
            waker,
            timer: HeapTimer::new(),
            pool,
            handler,
            connections: HashMap::new(),
            next_id: FIRST_CONNECTION_ID,
            completion_tx,
            completion_rx,
            expired_tx,
            expired_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { flag: Arc::clone(&self.shutdown), waker: self.waker.clone() }
    }

    /// Number of open connections, in-flight ones included.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs the event loop until [`ShutdownHandle::shutdown`] is called.
    pub fn run(&mut self) -> Result<(), ServerError> {
        info!(address = ?self.local_addr().ok(), workers = self.pool.size(), "start listening");

        while !self.shutdown.load(Ordering::Acquire) {
            let timeout = self.timer.next_tick();
            self.close_expired();

            let ready = self.notifier.wait(timeout).map_err(|source| ServerError::Notifier { source })?;
            for index in 0..ready {
                let event = self.notifier.event(index);
                match event.token() {
                    LISTENER_TOKEN => self.accept(),
                    WAKER_TOKEN => {
                        if let Err(e) = self.waker.drain() {
                            warn!(cause = %e, "failed to drain waker");
                        }
                        self.handle_completions();
                    }
                    id if event.is_closed() => self.close(id),
                    id if event.is_readable() => self.on_readable(id),
                    id if event.is_writable() => self.on_writable(id),
                    id => trace!(id, "ignore unexpected event"),
                }
            }
        }

        self.stop();
        Ok(())
    }

    fn stop(&mut self) {
        info!(connections = self.connections.len(), "shutting down");
        let ids: Vec<u64> = self.connections.keys().copied().collect();
        for id in ids {
            self.close(id);
        }
        self.pool.shutdown();
        self.handle_completions();
        self.timer.clear();
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(stream, peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    return;
                }
            }
            if !self.config.listen_trigger().is_edge() {
                return;
            }
        }
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(cause = %e, %peer, "failed to set nonblocking");
            return;
        }

        if self.connections.len() >= self.config.max_connections() {
            warn!(%peer, limit = self.config.max_connections(), "server busy");
            if let Err(e) = (&stream).write_all(BUSY_MESSAGE) {
                debug!(cause = %e, %peer, "failed to send busy message");
            }
            return;
        }

        let id = self.next_id;
        self.next_id += 1;

        let trigger = self.config.conn_trigger();
        if let Err(e) = self.notifier.add(stream.as_raw_fd(), id, Interest::READABLE | Interest::ONESHOT, trigger) {
            warn!(cause = %e, %peer, "failed to register connection");
            return;
        }

        self.arm_timer(id);
        self.connections.insert(id, Slot::Idle(Box::new(HttpConnection::new(id, stream, peer, trigger))));
        info!(id, %peer, count = self.connections.len(), "client in");
    }

    /// Starts (or restarts) the idle timer of `id`.
    fn arm_timer(&mut self, id: u64) {
        let expired = self.expired_tx.clone();
        self.timer.add(id, self.config.idle_timeout(), move || {
            if expired.send(id).is_err() {
                trace!(id, "expiry dropped, reactor is gone");
            }
        });
    }

    fn extend_time(&mut self, id: u64) {
        self.timer.adjust(id, self.config.idle_timeout());
    }

    fn on_readable(&mut self, id: u64) {
        let status = match self.connections.get_mut(&id) {
            Some(Slot::Idle(connection)) => connection.read(),
            _ => return,
        };
        self.extend_time(id);

        match status {
            Ok(ReadStatus::Open(_)) => self.dispatch(id),
            Ok(ReadStatus::Closed) => self.close(id),
            Err(e) => {
                debug!(id, cause = %e, "read failed");
                self.close(id);
            }
        }
    }

    fn on_writable(&mut self, id: u64) {
        let status = match self.connections.get_mut(&id) {
            Some(Slot::Idle(connection)) => connection.write(),
            _ => return,
        };
        self.extend_time(id);

        match status {
            Ok(WriteStatus::Done) => {
                let Some(Slot::Idle(connection)) = self.connections.get_mut(&id) else {
                    return;
                };
                connection.finish_response();
                if !connection.keep_alive() {
                    self.close(id);
                } else if connection.has_buffered_input() {
                    self.dispatch(id);
                } else {
                    self.rearm(id, Interest::READABLE);
                }
            }
            Ok(WriteStatus::Pending) => self.rearm(id, Interest::WRITABLE),
            Err(e) => {
                debug!(id, cause = %e, "write failed");
                self.close(id);
            }
        }
    }

    /// Moves the connection into a worker task.
    fn dispatch(&mut self, id: u64) {
        let connection = match self.connections.remove(&id) {
            Some(Slot::Idle(connection)) => connection,
            Some(slot) => {
                self.connections.insert(id, slot);
                return;
            }
            None => return,
        };
        let fd = connection.as_raw_fd();
        self.connections.insert(id, Slot::InFlight { fd, closed: false });
        // an owned connection is not idle, its timer restarts on hand-back
        self.timer.cancel(id);

        let handler = Arc::clone(&self.handler);
        let completion_tx = self.completion_tx.clone();
        let waker = self.waker.clone();

        let result = self.pool.add_task(move || {
            let mut connection = connection;
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| connection.process(&handler))) {
                Ok(outcome) => Outcome::Processed(outcome),
                Err(_) => {
                    error!(id, "request processing panicked");
                    Outcome::Failed
                }
            };

            if completion_tx.send(Completion { id, connection, outcome }).is_err() {
                return;
            }
            if let Err(e) = waker.wake() {
                error!(id, cause = %e, "failed to wake reactor");
            }
        });

        if let Err(e) = result {
            error!(id, cause = %e, "failed to dispatch connection");
            self.connections.remove(&id);
            self.forget(id, fd);
        }
    }

    /// Takes back connections that workers finished with.
    fn handle_completions(&mut self) {
        while let Ok(Completion { id, connection, outcome }) = self.completion_rx.try_recv() {
            let fd = connection.as_raw_fd();
            match self.connections.get(&id) {
                Some(Slot::InFlight { closed: false, .. }) => {}
                _ => {
                    debug!(id, "drop connection closed while in flight");
                    self.connections.remove(&id);
                    continue;
                }
            }

            let interest = match outcome {
                Outcome::Processed(ProcessOutcome::NeedMore) => Interest::READABLE,
                Outcome::Processed(ProcessOutcome::Respond) => Interest::WRITABLE,
                Outcome::Failed => {
                    self.connections.remove(&id);
                    self.forget(id, fd);
                    continue;
                }
            };

            self.connections.insert(id, Slot::Idle(connection));
            self.arm_timer(id);
            self.rearm(id, interest);
        }
    }

    fn rearm(&mut self, id: u64, interest: Interest) {
        let Some(Slot::Idle(connection)) = self.connections.get(&id) else {
            return;
        };
        let result =
            self.notifier.modify(connection.as_raw_fd(), id, interest | Interest::ONESHOT, self.config.conn_trigger());
        if let Err(e) = result {
            warn!(id, cause = %e, "failed to re-arm connection");
            self.close(id);
        }
    }

    /// Closes `id`, or marks it closed if a worker currently owns it.
    fn close(&mut self, id: u64) {
        match self.connections.get_mut(&id) {
            Some(Slot::InFlight { fd, closed }) => {
                *closed = true;
                let fd = *fd;
                self.forget(id, fd);
            }
            Some(Slot::Idle(_)) => {
                if let Some(Slot::Idle(connection)) = self.connections.remove(&id) {
                    self.forget(id, connection.as_raw_fd());
                    info!(id, peer = %connection.peer(), count = self.connections.len(), "client quit");
                }
            }
            None => {}
        }
    }

    /// Deregisters the socket and cancels the timer of `id`.
    fn forget(&mut self, id: u64, fd: RawFd) {
        if let Err(e) = self.notifier.delete(fd) {
            trace!(id, cause = %e, "failed to deregister");
        }
        self.timer.cancel(id);
    }

    fn close_expired(&mut self) {
        while let Ok(id) = self.expired_rx.try_recv() {
            debug!(id, "idle timeout");
            self.close(id);
        }
    }
}
