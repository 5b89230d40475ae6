//! Response-to-wire serialization.
//!
//! The whole header block is assembled in one buffer and written with a
//! single call; some clients expect the head to arrive in one packet. The
//! body follows through [`BodyWriter`], either from the response's own
//! payload or from a caller-supplied streaming callback.

use std::collections::HashSet;
use std::io::{self, Write};

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::connection::Connection;
use crate::protocol::{HttpResponse, PayloadSize, ResponseHeaders, SendError, SocketSessionFn};

const HEAD_BUFFER_SIZE: usize = 4 * 1024;
const FILE_CHUNK_SIZE: usize = 8 * 1024;

/// Writes one response. Returns whether keep-alive was granted and, for a
/// `101`, the session that takes over the connection.
///
/// Headers merge in precedence order: the explicit per-response set is
/// written in full, then auto headers derived from the response variant,
/// then the server-wide set, each name at most once with the earlier
/// source winning.
pub(crate) async fn respond(
    conn: &mut Connection,
    response: HttpResponse,
    explicit: &ResponseHeaders,
    global: &ResponseHeaders,
    keep_alive_requested: bool,
) -> Result<(bool, Option<SocketSessionFn>), SendError> {
    let status = response.status_code();
    let reason = response.reason_phrase().to_string();
    let auto = response.auto_headers();
    let (size, body_writer, session) = response.content();

    let mut head = BytesMut::with_capacity(HEAD_BUFFER_SIZE);
    let mut sink = HeadSink(&mut head);
    write!(sink, "HTTP/1.1 {status} {reason}\r\n")?;
    if let PayloadSize::Length(length) = size {
        write!(sink, "Content-Length: {length}\r\n")?;
    }
    let keep_alive = keep_alive_requested && size != PayloadSize::Unknown;
    if keep_alive {
        write!(sink, "Connection: keep-alive\r\n")?;
    } else {
        write!(sink, "Connection: close\r\n")?;
    }

    let mut sent = HashSet::new();
    for (name, value) in explicit.iter() {
        write!(sink, "{name}: {value}\r\n")?;
        sent.insert(name.to_ascii_lowercase());
    }
    for (name, value) in auto.iter() {
        if sent.insert(name.to_ascii_lowercase()) {
            write!(sink, "{name}: {value}\r\n")?;
        }
    }
    for (name, value) in global.iter() {
        if sent.insert(name.to_ascii_lowercase()) {
            write!(sink, "{name}: {value}\r\n")?;
        }
    }
    write!(sink, "\r\n")?;

    conn.write_all(&head).await?;
    if let Some(body_writer) = body_writer {
        body_writer(BodyWriter::new(conn)).await?;
    }
    conn.flush().await?;
    Ok((keep_alive, session))
}

struct HeadSink<'a>(&'a mut BytesMut);

impl Write for HeadSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streams body bytes onto the connection after the head has been written.
pub struct BodyWriter<'a> {
    conn: &'a mut Connection,
}

impl<'a> BodyWriter<'a> {
    pub(crate) fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<(), SendError> {
        self.conn.write_all(data).await?;
        Ok(())
    }

    /// Streams a whole file in fixed-size chunks.
    pub async fn write_file(&mut self, file: &mut File) -> Result<(), SendError> {
        let mut chunk = [0u8; FILE_CHUNK_SIZE];
        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                return Ok(());
            }
            self.conn.write_all(&chunk[..read]).await?;
        }
    }
}
