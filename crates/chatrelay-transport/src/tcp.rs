//! Newline-delimited TCP transport.
//!
//! Each record is one line. Inbound lines may end in `\n` or `\r\n`;
//! outbound records are terminated with `\n`. This is the transport plain
//! terminal clients (netcat, telnet) speak.
//!
//! Framing is `tokio_util`'s [`LinesCodec`] on each split half. A line
//! longer than [`MAX_LINE_LENGTH`] is a receive error, so one client
//! cannot make the server buffer without bound.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Longest inbound line accepted, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 8192;

/// A TCP [`Transport`] that listens for incoming line-oriented clients.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted TCP connection");

        let (read, write) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer_addr: addr,
            reader: Mutex::new(FramedRead::new(
                read,
                LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            )),
            writer: Mutex::new(FramedWrite::new(write, LinesCodec::new())),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single line-oriented TCP connection.
///
/// A partial line stays in the `FramedRead` buffer, so a cancelled `recv`
/// loses nothing.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, LinesCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LinesCodec>>,
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let text = String::from_utf8_lossy(data);
        let line = text.strip_suffix('\n').unwrap_or(&text);
        self.writer
            .lock()
            .await
            .send(line)
            .await
            .map_err(|e| TransportError::SendFailed(into_io(e)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        match self.reader.lock().await.next().await {
            Some(Ok(line)) => Ok(Some(line.into_bytes())),
            Some(Err(e)) => Err(TransportError::ReceiveFailed(into_io(e))),
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        SinkExt::<&str>::close(&mut *self.writer.lock().await)
            .await
            .map_err(|e| TransportError::SendFailed(into_io(e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

fn into_io(err: LinesCodecError) -> std::io::Error {
    match err {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("line exceeds {MAX_LINE_LENGTH} bytes"),
        ),
    }
}
