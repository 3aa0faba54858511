//! Readiness notification over Linux `epoll`.
//!
//! Every registration carries a `u64` token handed back with its events. Connection sockets
//! are registered one-shot: after an event fires the descriptor stays silent until it is
//! re-armed with [`Notifier::modify`], so at most one party (the reactor or one worker) acts on
//! a connection at any time.
//!
//! [`Waker`] is an `eventfd` registered like any other descriptor; workers use it to interrupt
//! a blocking [`Notifier::wait`] when they hand a connection back.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::ops::BitOr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

/// How readiness is reported for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Reported as long as the descriptor stays ready.
    Level,
    /// Reported once per transition to ready.
    #[default]
    Edge,
}

impl TriggerMode {
    #[inline]
    pub fn is_edge(self) -> bool {
        matches!(self, TriggerMode::Edge)
    }

    fn bits(self) -> u32 {
        match self {
            TriggerMode::Level => 0,
            TriggerMode::Edge => libc::EPOLLET as u32,
        }
    }
}

/// Events a registration is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u32);

impl Interest {
    /// Readable, including peer half-close.
    pub const READABLE: Interest = Interest((libc::EPOLLIN | libc::EPOLLRDHUP) as u32);
    pub const WRITABLE: Interest = Interest(libc::EPOLLOUT as u32);
    /// Disarm after the first event until re-armed.
    pub const ONESHOT: Interest = Interest(libc::EPOLLONESHOT as u32);

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// One readiness event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    token: u64,
    events: u32,
}

impl Event {
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.events & libc::EPOLLIN as u32 != 0
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.events & libc::EPOLLOUT as u32 != 0
    }

    /// Peer hang-up, half-close or socket error.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.events & (libc::EPOLLRDHUP | libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0
    }
}

pub struct Notifier {
    epoll: OwnedFd,
    events: Vec<libc::epoll_event>,
    ready: usize,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("epoll", &self.epoll)
            .field("capacity", &self.events.len())
            .field("ready", &self.ready)
            .finish()
    }
}

impl Notifier {
    /// Creates an epoll instance reporting at most `max_events` events per wait.
    pub fn new(max_events: usize) -> io::Result<Self> {
        // SAFETY: epoll_create1 has no memory preconditions; the result is checked below.
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` is a freshly created descriptor owned by nobody else.
        let epoll = unsafe { OwnedFd::from_raw_fd(fd) };

        Ok(Self { epoll, events: vec![libc::epoll_event { events: 0, u64: 0 }; max_events.max(1)], ready: 0 })
    }

    pub fn add(&self, fd: RawFd, token: u64, interest: Interest, mode: TriggerMode) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, token, interest.bits() | mode.bits())
    }

    /// Replaces the interest of a registered descriptor, re-arming a one-shot registration.
    pub fn modify(&self, fd: RawFd, token: u64, interest: Interest, mode: TriggerMode) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, token, interest.bits() | mode.bits())
    }

    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        // SAFETY: EPOLL_CTL_DEL ignores the event argument, a null pointer is accepted.
        let ret = unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Blocks until events arrive or `timeout` elapses; `None` waits indefinitely.
    ///
    /// Returns the number of events, readable through [`Notifier::event`]. A wait interrupted
    /// by a signal reports zero events.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        let timeout_ms = match timeout {
            None => -1,
            // round up so a sub-millisecond deadline does not turn into a busy loop
            Some(timeout) => i32::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX),
        };
        let capacity = i32::try_from(self.events.len()).unwrap_or(i32::MAX);

        // SAFETY: `events` is valid for `capacity` entries for the duration of the call.
        let n = unsafe { libc::epoll_wait(self.epoll.as_raw_fd(), self.events.as_mut_ptr(), capacity, timeout_ms) };
        if n < 0 {
            let e = io::Error::last_os_error();
            self.ready = 0;
            return if e.kind() == ErrorKind::Interrupted { Ok(0) } else { Err(e) };
        }

        self.ready = n as usize;
        Ok(self.ready)
    }

    /// The `index`-th event of the last wait.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the count returned by the last [`Notifier::wait`].
    pub fn event(&self, index: usize) -> Event {
        assert!(index < self.ready, "event {index} out of {} ready", self.ready);
        let raw = self.events[index];
        Event { token: raw.u64, events: raw.events }
    }

    fn ctl(&self, op: i32, fd: RawFd, token: u64, events: u32) -> io::Result<()> {
        let mut event = libc::epoll_event { events, u64: token };
        // SAFETY: `event` lives on the stack for the duration of the call.
        let ret = unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), op, fd, &mut event) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Wakes a [`Notifier`] from another thread.
#[derive(Debug, Clone)]
pub struct Waker {
    event_fd: Arc<File>,
}

impl Waker {
    pub fn new() -> io::Result<Self> {
        // SAFETY: eventfd has no memory preconditions; the result is checked below.
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` is a freshly created descriptor owned by nobody else.
        let event_fd = File::from(unsafe { OwnedFd::from_raw_fd(fd) });
        Ok(Self { event_fd: Arc::new(event_fd) })
    }

    /// Makes the eventfd readable.
    pub fn wake(&self) -> io::Result<()> {
        match (&*self.event_fd).write(&1u64.to_ne_bytes()) {
            Ok(_) => Ok(()),
            // the counter is saturated, so a wake-up is already pending
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Resets the counter after the notifier reported the eventfd readable.
    pub fn drain(&self) -> io::Result<()> {
        let mut counter = [0u8; 8];
        match (&*self.event_fd).read(&mut counter) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl AsRawFd for Waker {
    fn as_raw_fd(&self) -> RawFd {
        self.event_fd.as_raw_fd()
    }
}
