//! Buffered byte-level access to one client connection.
//!
//! [`Connection`] wraps any async stream behind one vtable so the rest of
//! the crate never goes generic over the transport. The parser reads lines
//! and counted bodies through it, the writer sends response bytes through
//! it, and a `101 Switching Protocols` session receives it whole, buffer
//! included, so no bytes the client already sent are lost in the hand-off.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const READ_BUFFER_SIZE: usize = 4 * 1024;

/// Transport requirements for a connection. Blanket-implemented, so TCP
/// streams and in-memory duplex pipes qualify alike.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// One client connection with its read buffer.
pub struct Connection {
    io: Box<dyn AsyncStream>,
    buffer: BytesMut,
    peer: Option<SocketAddr>,
}

impl Connection {
    pub fn new(io: impl AsyncStream + 'static, peer: Option<SocketAddr>) -> Self {
        Self {
            io: Box::new(io),
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
            peer,
        }
    }

    #[inline]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Reads one line, consuming up to and including the next LF. The line
    /// terminator is stripped, CRLF and bare LF both. Bytes are widened as
    /// Latin-1, so broken encodings cannot fail the read.
    pub async fn read_line(&mut self) -> io::Result<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                return Ok(line.iter().map(|&b| char::from(b)).collect());
            }
            self.fill().await?;
        }
    }

    /// Reads exactly `len` bytes.
    pub async fn read_exact(&mut self, len: usize) -> io::Result<Bytes> {
        while self.buffer.len() < len {
            self.fill().await?;
        }
        Ok(self.buffer.split_to(len).freeze())
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.io.write_all(data).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.io.flush().await
    }

    async fn fill(&mut self) -> io::Result<()> {
        let read = self.io.read_buf(&mut self.buffer).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn read_line_strips_both_line_endings() {
        let (client, server) = duplex(256);
        let mut conn = Connection::new(server, None);
        let mut client = client;
        client.write_all(b"GET / HTTP/1.1\r\nHost: a\n\r\n").await.unwrap();

        assert_eq!(conn.read_line().await.unwrap(), "GET / HTTP/1.1");
        assert_eq!(conn.read_line().await.unwrap(), "Host: a");
        assert_eq!(conn.read_line().await.unwrap(), "");
    }

    #[tokio::test]
    async fn read_exact_continues_after_line() {
        let (client, server) = duplex(256);
        let mut conn = Connection::new(server, None);
        let mut client = client;
        client.write_all(b"5\r\nhello!").await.unwrap();

        assert_eq!(conn.read_line().await.unwrap(), "5");
        assert_eq!(conn.read_exact(5).await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(conn.read_exact(1).await.unwrap(), Bytes::from_static(b"!"));
    }

    #[tokio::test]
    async fn eof_mid_line_is_unexpected_eof() {
        let (client, server) = duplex(256);
        let mut conn = Connection::new(server, None);
        let mut client = client;
        client.write_all(b"GET / HT").await.unwrap();
        drop(client);

        let error = conn.read_line().await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn non_utf8_bytes_widen_instead_of_failing() {
        let (client, server) = duplex(256);
        let mut conn = Connection::new(server, None);
        let mut client = client;
        client.write_all(&[b'a', 0xFF, b'\r', b'\n']).await.unwrap();

        assert_eq!(conn.read_line().await.unwrap(), "a\u{FF}");
    }
}
