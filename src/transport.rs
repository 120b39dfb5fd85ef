//! Framed, non-blocking byte-stream transport.
//!
//! [`Transport`] is the seam between the client and the network. The client
//! only needs four things from it: open, close, pull at most one complete
//! line without blocking, and push a line without blocking. [`TcpTransport`]
//! implements it over plain TCP or TLS; tests drive the client through an
//! in-memory implementation instead.

#[cfg(feature = "tls")]
mod tls;

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tracing::{debug, trace, warn};

use crate::error::TransportError;

/// Maximum number of bytes buffered while waiting for a line terminator.
pub const MAX_IRC_LINE_LEN: usize = 8191;

const READ_CHUNK: usize = 4096;

/// How a TLS connection verifies the server certificate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VerifyMode {
    /// Verify against the bundled web PKI roots.
    #[default]
    Full,
    /// Accept any certificate.
    None,
}

/// A connection that yields and accepts IRC lines.
///
/// `read` and `write` must never block for network I/O.
pub trait Transport: Send {
    /// Open the connection. Opening an already-open transport reopens it.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the connection and drop any buffered input and queued output.
    /// Idempotent.
    fn disconnect(&mut self);

    /// Make one non-blocking receive attempt and return at most one
    /// complete line, terminator included.
    ///
    /// End of stream is reported as [`TransportError::Closed`] once every
    /// complete buffered line has been returned.
    fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Queue `line` (CRLF appended if missing) and send as much as the
    /// socket accepts. Earlier queued bytes always go out first.
    fn write(&mut self, line: &str) -> Result<(), TransportError>;

    /// Whether the transport believes it is connected.
    fn is_open(&self) -> bool;
}

/// Accumulates received bytes and splits them into `\n`-terminated lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Remove and return the first complete line.
    pub(crate) fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        Some(self.buf.drain(..=end).collect())
    }

    /// Discard the buffer if it has grown past the line limit with no
    /// terminator in sight.
    pub(crate) fn check_overflow(&mut self) -> Result<(), TransportError> {
        if self.buf.len() > MAX_IRC_LINE_LEN {
            let len = self.buf.len();
            self.buf.clear();
            return Err(TransportError::LineTooLong(len));
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }
}

enum Stream {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
}

impl Stream {
    fn shutdown(self) {
        match self {
            Stream::Plain(sock) => {
                let _ = sock.shutdown(Shutdown::Both);
            }
            #[cfg(feature = "tls")]
            Stream::Tls(mut tls) => {
                tls.conn.send_close_notify();
                let _ = tls.conn.complete_io(&mut tls.sock);
                let _ = tls.sock.shutdown(Shutdown::Both);
            }
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(sock) => sock.read(buf),
            #[cfg(feature = "tls")]
            Stream::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(sock) => sock.write(buf),
            #[cfg(feature = "tls")]
            Stream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(sock) => sock.flush(),
            #[cfg(feature = "tls")]
            Stream::Tls(tls) => tls.flush(),
        }
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::NotConnected
    )
}

/// TCP (optionally TLS) implementation of [`Transport`].
pub struct TcpTransport {
    host: String,
    port: u16,
    tls: Option<VerifyMode>,
    connect_timeout: Duration,
    stream: Option<Stream>,
    read_buf: LineBuffer,
    write_queue: VecDeque<Vec<u8>>,
    eof: bool,
}

impl TcpTransport {
    /// A plaintext transport to `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
            connect_timeout: Duration::from_secs(30),
            stream: None,
            read_buf: LineBuffer::default(),
            write_queue: VecDeque::new(),
            eof: false,
        }
    }

    /// Wrap the connection in TLS, verifying the server as `verify` says.
    #[must_use]
    pub fn with_tls(mut self, verify: VerifyMode) -> Self {
        self.tls = Some(verify);
        self
    }

    /// Bound on how long opening the socket (and the TLS handshake) may take.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, TransportError> {
        let mut addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve {
                host: self.host.clone(),
                reason: e.to_string(),
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::Resolve {
                host: self.host.clone(),
                reason: "no addresses found".to_string(),
            });
        }

        // IPv4 first; the sort is stable so resolver order is kept otherwise.
        addrs.sort_by_key(|addr| !addr.is_ipv4());
        Ok(addrs)
    }

    fn open(&self, addr: &SocketAddr) -> Result<TcpStream, TransportError> {
        let stream = TcpStream::connect_timeout(addr, self.connect_timeout).map_err(|e| {
            match e.kind() {
                ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout {
                    addr: addr.to_string(),
                    after: self.connect_timeout,
                },
                ErrorKind::ConnectionRefused => TransportError::Refused(addr.to_string()),
                ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable => {
                    TransportError::Unreachable(addr.to_string())
                }
                _ => TransportError::Io(e),
            }
        })?;

        if let Err(e) = Self::enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));

        sock.set_tcp_keepalive(&keepalive)
    }

    fn establish(&self, sock: TcpStream) -> Result<Stream, TransportError> {
        let stream = match self.tls {
            None => Stream::Plain(sock),
            #[cfg(feature = "tls")]
            Some(verify) => Stream::Tls(Box::new(tls::handshake(
                &self.host,
                sock,
                verify,
                self.connect_timeout,
            )?)),
            #[cfg(not(feature = "tls"))]
            Some(_) => {
                return Err(TransportError::Tls(
                    "built without the `tls` feature".to_string(),
                ))
            }
        };

        match &stream {
            Stream::Plain(sock) => sock.set_nonblocking(true)?,
            #[cfg(feature = "tls")]
            Stream::Tls(tls) => tls.sock.set_nonblocking(true)?,
        }
        Ok(stream)
    }

    fn flush_queue(&mut self) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        while let Some(front) = self.write_queue.front_mut() {
            match stream.write(front) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) if n == front.len() => {
                    self.write_queue.pop_front();
                }
                Ok(n) => {
                    front.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_disconnect(&e) => return Err(TransportError::Closed),
                Err(e) => return Err(e.into()),
            }
        }

        match stream.flush() {
            Err(e) if is_disconnect(&e) => Err(TransportError::Closed),
            _ => Ok(()),
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.disconnect();

        let mut last_err = None;
        for addr in self.resolve()? {
            debug!(%addr, "opening connection");
            match self.open(&addr) {
                Ok(sock) => {
                    self.stream = Some(self.establish(sock)?);
                    self.eof = false;
                    debug!(%addr, tls = self.is_tls(), "connection established");
                    return Ok(());
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connection attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::Resolve {
            host: self.host.clone(),
            reason: "no addresses found".to_string(),
        }))
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(host = %self.host, "closing connection");
            stream.shutdown();
        }
        self.read_buf.clear();
        self.write_queue.clear();
        self.eof = false;
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.stream.is_none() {
            return Err(TransportError::NotConnected);
        }
        if let Some(line) = self.read_buf.next_line() {
            return Ok(Some(line));
        }
        if self.eof {
            return Err(TransportError::Closed);
        }

        if !self.write_queue.is_empty() {
            self.flush_queue()?;
        }

        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut chunk = [0u8; READ_CHUNK];
        match stream.read(&mut chunk) {
            Ok(0) => self.eof = true,
            Ok(n) => {
                trace!(bytes = n, "received");
                self.read_buf.extend(&chunk[..n]);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) if is_disconnect(&e) => self.eof = true,
            Err(e) => return Err(e.into()),
        }

        if let Some(line) = self.read_buf.next_line() {
            return Ok(Some(line));
        }
        self.read_buf.check_overflow()?;
        if self.eof {
            return Err(TransportError::Closed);
        }
        Ok(None)
    }

    fn write(&mut self, line: &str) -> Result<(), TransportError> {
        if self.stream.is_none() {
            return Err(TransportError::NotConnected);
        }

        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        if !line.ends_with('\n') {
            bytes.extend_from_slice(b"\r\n");
        }
        self.write_queue.push_back(bytes);
        self.flush_queue()
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::time::Instant;

    fn read_line_within(transport: &mut TcpTransport, limit: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if let Some(line) = transport.read().unwrap() {
                return Some(line);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_line_buffer_framing() {
        let mut buf = LineBuffer::default();
        buf.extend(b"PING :a\r\nPIN");
        assert_eq!(buf.next_line().unwrap(), b"PING :a\r\n");
        assert!(buf.next_line().is_none());
        buf.extend(b"G :b\n");
        assert_eq!(buf.next_line().unwrap(), b"PING :b\n");
    }

    #[test]
    fn test_line_buffer_overflow_discards() {
        let mut buf = LineBuffer::default();
        buf.extend(&vec![b'x'; MAX_IRC_LINE_LEN + 1]);
        assert!(matches!(
            buf.check_overflow(),
            Err(TransportError::LineTooLong(n)) if n == MAX_IRC_LINE_LEN + 1
        ));
        buf.extend(b"ok\n");
        assert_eq!(buf.next_line().unwrap(), b"ok\n");
    }

    #[test]
    fn test_unopened_transport() {
        let mut transport = TcpTransport::new("127.0.0.1", 6667);
        assert!(!transport.is_open());
        assert!(matches!(transport.read(), Err(TransportError::NotConnected)));
        assert!(matches!(transport.write("PING x"), Err(TransportError::NotConnected)));
        transport.disconnect();
        transport.disconnect();
    }

    #[test]
    fn test_refused_connection() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut transport =
            TcpTransport::new("127.0.0.1", port).with_connect_timeout(Duration::from_secs(2));
        assert!(matches!(transport.connect(), Err(TransportError::Refused(_))));
    }

    #[test]
    fn test_plain_round_trip_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(sock.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            sock.write_all(b":srv NOTICE * :one\r\n:srv NOTICE * :two\r\n")
                .unwrap();
            line
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().unwrap();
        assert!(transport.is_open());
        transport.write("NICK dan").unwrap();

        let first = read_line_within(&mut transport, Duration::from_secs(5)).unwrap();
        assert_eq!(first, b":srv NOTICE * :one\r\n");
        let second = read_line_within(&mut transport, Duration::from_secs(5)).unwrap();
        assert_eq!(second, b":srv NOTICE * :two\r\n");

        assert_eq!(server.join().unwrap(), "NICK dan\r\n");

        // The server hung up; buffered lines are drained, so Closed follows.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match transport.read() {
                Err(TransportError::Closed) => break,
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5))
                }
                other => panic!("unexpected read result: {:?}", other),
            }
        }

        transport.disconnect();
        assert!(!transport.is_open());
    }
}
