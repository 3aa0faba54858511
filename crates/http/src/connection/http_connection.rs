use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

use tracing::{debug, trace};

use crate::buffer::Buffer;
use crate::codec::RequestParser;
use crate::connection::MessageWriter;
use crate::handler::RequestHandler;
use crate::protocol::{HttpError, SendError};
use crate::server::TriggerMode;

/// Initial size of the read buffer
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Initial size of the buffer holding a serialized response head
const WRITE_BUFFER_SIZE: usize = 1024;

/// Outcome of draining the socket into the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The socket is still open; this many bytes were read.
    Open(usize),
    /// The peer closed its side.
    Closed,
}

/// Outcome of sending the pending response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Everything was sent.
    Done,
    /// The socket cannot take more right now.
    Pending,
}

/// Outcome of running the buffered bytes through the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The request is not complete yet.
    NeedMore,
    /// A response is ready to be written.
    Respond,
}

/// One client connection.
///
/// The socket is non-blocking; in edge-triggered mode reads and writes loop until the kernel
/// reports `WouldBlock`, in level-triggered mode each readiness notification gets one attempt.
#[derive(Debug)]
pub struct HttpConnection {
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    trigger: TriggerMode,
    read_buffer: Buffer,
    parser: RequestParser,
    writer: MessageWriter,
    keep_alive: bool,
}

impl HttpConnection {
    pub fn new(id: u64, stream: TcpStream, peer: SocketAddr, trigger: TriggerMode) -> Self {
        Self {
            id,
            stream,
            peer,
            trigger,
            read_buffer: Buffer::with_capacity(READ_BUFFER_SIZE),
            parser: RequestParser::new(),
            writer: MessageWriter::with_capacity(WRITE_BUFFER_SIZE),
            keep_alive: false,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Bytes of the current response not sent yet.
    #[inline]
    pub fn to_write_bytes(&self) -> usize {
        self.writer.remaining()
    }

    /// Whether bytes of a following request are already buffered.
    #[inline]
    pub fn has_buffered_input(&self) -> bool {
        !self.read_buffer.is_empty()
    }

    /// Reads what the socket has into the read buffer.
    pub fn read(&mut self) -> Result<ReadStatus, HttpError> {
        let mut total = 0;
        loop {
            match self.read_buffer.read_from(&mut self.stream) {
                Ok(0) => return Ok(ReadStatus::Closed),
                Ok(n) => {
                    total += n;
                    if !self.trigger.is_edge() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        trace!(id = self.id, read = total, buffered = self.read_buffer.readable_bytes(), "read from socket");
        Ok(ReadStatus::Open(total))
    }

    /// Parses the buffered bytes and, once a request is complete, prepares its response.
    ///
    /// Runs on a worker thread.
    pub fn process(&mut self, handler: &RequestHandler) -> ProcessOutcome {
        let parsed = match self.parser.parse(&mut self.read_buffer) {
            Ok(None) => return ProcessOutcome::NeedMore,
            Ok(Some(request)) => Ok(request),
            Err(e) => Err(e),
        };
        self.parser.reset();

        let reply = handler.handle(parsed, self.writer.buffer_mut());
        debug!(id = self.id, status = %reply.status, keep_alive = reply.keep_alive, "response ready");

        self.keep_alive = reply.keep_alive;
        self.writer.set_payload(reply.payload);
        ProcessOutcome::Respond
    }

    /// Sends the pending response.
    pub fn write(&mut self) -> Result<WriteStatus, SendError> {
        loop {
            if self.writer.is_empty() {
                return Ok(WriteStatus::Done);
            }

            match self.writer.write_to(&mut self.stream) {
                Ok(0) => return Err(SendError::io(io::Error::from(ErrorKind::WriteZero))),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(WriteStatus::Pending),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            if !self.trigger.is_edge() && !self.writer.is_empty() {
                return Ok(WriteStatus::Pending);
            }
        }
    }

    /// Forgets the finished exchange; buffered bytes of a pipelined request are kept.
    pub fn finish_response(&mut self) {
        self.writer.clear();
    }
}

impl AsRawFd for HttpConnection {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{default_error_pages, ResponseBuilder};
    use crate::handler::MemoryUserStore;
    use crate::static_files::StaticRoot;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::{fs, thread, time::Duration};

    fn pair(trigger: TriggerMode) -> (HttpConnection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, peer) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (HttpConnection::new(1, server, peer, trigger), client)
    }

    fn read_until_open(connection: &mut HttpConnection, expected: usize) {
        let mut total = 0;
        for _ in 0..100 {
            if let ReadStatus::Open(n) = connection.read().unwrap() {
                total += n;
            }
            if total >= expected {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("only {total} of {expected} bytes arrived");
    }

    #[test]
    fn request_round_trip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html>hi</html>").unwrap();
        let builder = ResponseBuilder::new(StaticRoot::new(dir.path()), default_error_pages());
        let handler = RequestHandler::new(builder, Arc::new(MemoryUserStore::new()));

        let (mut connection, mut client) = pair(TriggerMode::Edge);
        let request = b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n";
        client.write_all(request).unwrap();

        read_until_open(&mut connection, request.len());
        assert_eq!(connection.process(&handler), ProcessOutcome::Respond);
        assert!(connection.keep_alive());
        assert!(connection.to_write_bytes() > 15);

        assert_eq!(connection.write().unwrap(), WriteStatus::Done);
        connection.finish_response();
        assert_eq!(connection.to_write_bytes(), 0);

        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut response = Vec::new();
        let mut chunk = [0u8; 1024];
        while !response.ends_with(b"</html>") {
            let len = client.read(&mut chunk).unwrap();
            assert!(len > 0, "connection closed early");
            response.extend_from_slice(&chunk[..len]);
        }
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\n<html>hi</html>"));
    }

    #[test]
    fn incomplete_request_needs_more() {
        let handler = RequestHandler::new(
            ResponseBuilder::new(StaticRoot::new("/nonexistent"), default_error_pages()),
            Arc::new(MemoryUserStore::new()),
        );
        let (mut connection, mut client) = pair(TriggerMode::Level);
        client.write_all(b"GET / HTTP/1.1\r\nHost: x").unwrap();

        read_until_open(&mut connection, 23);
        assert_eq!(connection.process(&handler), ProcessOutcome::NeedMore);
        assert_eq!(connection.to_write_bytes(), 0);
    }

    #[test]
    fn peer_close_is_reported() {
        let (mut connection, client) = pair(TriggerMode::Edge);
        drop(client);

        let mut status = connection.read().unwrap();
        for _ in 0..100 {
            if status == ReadStatus::Closed {
                break;
            }
            thread::sleep(Duration::from_millis(10));
            status = connection.read().unwrap();
        }
        assert_eq!(status, ReadStatus::Closed);
    }
}
