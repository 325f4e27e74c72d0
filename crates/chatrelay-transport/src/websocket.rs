//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! `accept()` returns as soon as the TCP stream is accepted. The upgrade
//! happens lazily on first use, so a client that stalls mid-handshake
//! only ever holds up its own session.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, OnceCell};
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Upper bound on the upgrade exchange.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Accepts the TCP stream only. The WebSocket upgrade runs on the
    /// connection's first `send`/`recv`, in the session's own task.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection {
            id,
            peer_addr: addr,
            pending: Mutex::new(Some(stream)),
            halves: OnceCell::new(),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Both directions of an upgraded stream, locked independently.
struct Halves {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

/// A single WebSocket connection, one text frame per record.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    /// The raw stream until the upgrade takes it.
    pending: Mutex<Option<TcpStream>>,
    halves: OnceCell<Halves>,
}

impl WebSocketConnection {
    /// Completes the WebSocket upgrade if it has not happened yet.
    ///
    /// `send` and `recv` call this themselves; it only needs calling
    /// directly to upgrade before any traffic. Concurrent callers wait for
    /// the same handshake.
    pub async fn handshake(&self) -> Result<(), TransportError> {
        self.halves().await.map(|_| ())
    }

    async fn halves(&self) -> Result<&Halves, TransportError> {
        self.halves
            .get_or_try_init(|| async {
                let stream = self.pending.lock().await.take().ok_or_else(|| {
                    TransportError::AcceptFailed(std::io::Error::new(
                        std::io::ErrorKind::NotConnected,
                        "WebSocket handshake already failed",
                    ))
                })?;

                let ws = tokio::time::timeout(
                    HANDSHAKE_TIMEOUT,
                    tokio_tungstenite::accept_async(stream),
                )
                .await
                .map_err(|_| {
                    TransportError::AcceptFailed(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("WebSocket handshake from {} timed out", self.peer_addr),
                    ))
                })?
                .map_err(|e| {
                    TransportError::AcceptFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        e,
                    ))
                })?;

                tracing::debug!(id = %self.id, "WebSocket handshake complete");
                let (sink, stream) = ws.split();
                Ok::<_, TransportError>(Halves {
                    sink: Mutex::new(sink),
                    stream: Mutex::new(stream),
                })
            })
            .await
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let text = String::from_utf8_lossy(data).into_owned();
        self.halves()
            .await?
            .sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.halves().await?.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let Some(halves) = self.halves.get() else {
            // Never upgraded: just drop the raw stream.
            self.pending.lock().await.take();
            return Ok(());
        };
        halves.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}
