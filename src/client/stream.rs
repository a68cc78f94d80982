//! Control-channel stream that can be upgraded to TLS in place
//!
//! The connection starts as plain TCP. After the server accepts
//! `AUTH TLS` the same socket is wrapped by a TLS client stream and the
//! buffered reader is reinstantiated around it.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Either side of the TLS upgrade
#[derive(Debug)]
pub(super) enum Stream {
    Plain(BufReader<TcpStream>),
    Tls(BufReader<TlsStream<TcpStream>>),
    /// Placeholder after close or a failed upgrade
    Closed,
}

impl Stream {
    pub(super) fn plain(conn: TcpStream) -> Self {
        Stream::Plain(BufReader::new(conn))
    }

    /// Read one line including its terminator. An empty result means the
    /// peer closed the connection.
    pub(super) async fn read_line_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::with_capacity(512);
        match self {
            Stream::Plain(r) => r.read_until(b'\n', &mut line).await?,
            Stream::Tls(r) => r.read_until(b'\n', &mut line).await?,
            Stream::Closed => return Err(io::ErrorKind::NotConnected.into()),
        };
        Ok(line)
    }

    pub(super) async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Stream::Plain(r) => {
                r.get_mut().write_all(buf).await?;
                r.get_mut().flush().await
            }
            Stream::Tls(r) => {
                r.get_mut().write_all(buf).await?;
                r.get_mut().flush().await
            }
            Stream::Closed => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    /// Take the underlying TCP socket out of a plain stream for the TLS
    /// handshake, leaving `Closed` behind. Only valid between replies,
    /// when the read buffer holds no unconsumed bytes.
    pub(super) fn take_plain(&mut self) -> Option<TcpStream> {
        match std::mem::replace(self, Stream::Closed) {
            Stream::Plain(r) => Some(r.into_inner()),
            other => {
                *self = other;
                None
            }
        }
    }

    pub(super) fn is_plain(&self) -> bool {
        matches!(self, Stream::Plain(_))
    }
}
