//! Per-connection session: reader loop, writer task, and teardown.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Spawn the writer task, which owns all writes to the socket
//!   2. Loop: receive records → decode → run a command or relay chat
//!   3. On any exit: leave the roster, tell everyone, flush and close
//!
//! A session never holds the roster lock across socket I/O. Everything it
//! sends, to itself or to others, goes through an `OutboundWriter`, and
//! queueing on one never waits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatrelay_protocol::{Codec, Envelope, Timestamp, lines};
use chatrelay_roster::{Outbound, OutboundReceiver, OutboundWriter};
use chatrelay_transport::{Connection, ConnectionId};

use crate::command::{Caller, Disposition, execute};
use crate::server::ServerState;

/// How long teardown waits for the writer task to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The client sent `/disconnect`.
    ClientDisconnect,
    /// The client closed its side of the stream.
    PeerClosed,
    /// Reading from the client failed.
    ReadFailed(String),
    /// Writing to the client failed and the writer task exited.
    WriteFailed,
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
    /// The server is shutting down.
    ServerShutdown,
}

/// Outcome of waiting for the next inbound record.
enum Inbound {
    Record(Vec<u8>),
    Eof,
    Idle,
    Failed(String),
}

/// Runs one connection from accept to close.
pub(crate) async fn handle_connection<Conn, C>(
    conn: Conn,
    state: Arc<ServerState>,
    codec: Arc<C>,
) -> SessionEnd
where
    Conn: Connection,
    C: Codec,
{
    let id = conn.id();
    let origin = conn.peer_addr();
    tracing::info!(conn_id = %id, %origin, "session started");

    let conn = Arc::new(conn);
    let (writer, rx) = OutboundWriter::channel(id);
    let mut writer_task = tokio::spawn(write_loop(Arc::clone(&conn), rx));

    let end = read_loop(&*conn, &state, codec.as_ref(), id, origin, &writer).await;
    tracing::info!(conn_id = %id, ?end, "session ending");

    leave(&state, id).await;

    writer.close();
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(conn_id = %id, error = %e, "writer task failed"),
        Err(_) => {
            tracing::warn!(conn_id = %id, "writer did not drain in time, aborting");
            writer_task.abort();
        }
    }

    end
}

/// Drains the outbound queue into the connection.
///
/// Exits on `Outbound::Close`, on the first failed send, or when every
/// writer handle is gone. Dropping the receiver is what wakes
/// `OutboundWriter::closed()` in the reader loop.
async fn write_loop<Conn: Connection>(conn: Arc<Conn>, mut rx: OutboundReceiver) {
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Line(line) => {
                if let Err(e) = conn.send(line.as_bytes()).await {
                    tracing::warn!(conn_id = %conn.id(), error = %e, "send failed");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    drop(rx);

    if let Err(e) = conn.close().await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "close failed");
    }
}

async fn read_loop<Conn, C>(
    conn: &Conn,
    state: &ServerState,
    codec: &C,
    id: ConnectionId,
    origin: SocketAddr,
    writer: &OutboundWriter,
) -> SessionEnd
where
    Conn: Connection,
    C: Codec,
{
    let mut shutdown = state.shutdown.subscribe();
    if *shutdown.borrow_and_update() {
        return SessionEnd::ServerShutdown;
    }

    let caller = Caller { id, origin, writer };

    loop {
        let inbound = tokio::select! {
            biased;
            _ = shutdown.changed() => return SessionEnd::ServerShutdown,
            _ = writer.closed() => return SessionEnd::WriteFailed,
            inbound = next_inbound(conn, state.config.idle_timeout) => inbound,
        };

        let data = match inbound {
            Inbound::Record(data) => data,
            Inbound::Eof => return SessionEnd::PeerClosed,
            Inbound::Idle => return SessionEnd::IdleTimeout,
            Inbound::Failed(reason) => return SessionEnd::ReadFailed(reason),
        };

        let envelope = match codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(conn_id = %id, error = %e, "failed to decode envelope");
                continue;
            }
        };
        if envelope.body.trim().is_empty() {
            continue;
        }

        match envelope.command_text() {
            Some(text) => {
                if execute(state, &caller, text).await == Disposition::Close {
                    return SessionEnd::ClientDisconnect;
                }
            }
            None => relay_chat(state, id, origin, envelope).await,
        }
    }
}

async fn next_inbound<Conn: Connection>(conn: &Conn, idle: Option<Duration>) -> Inbound {
    let result = match idle {
        Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
            Ok(result) => result,
            Err(_) => return Inbound::Idle,
        },
        None => conn.recv().await,
    };

    match result {
        Ok(Some(data)) => Inbound::Record(data),
        Ok(None) => Inbound::Eof,
        Err(e) => Inbound::Failed(e.to_string()),
    }
}

/// Stamps a chat line and delivers it to everyone, the sender included.
///
/// Sessions that have not connected yet are labelled with their address.
async fn relay_chat(state: &ServerState, id: ConnectionId, origin: SocketAddr, envelope: Envelope) {
    let roster = state.roster.lock().await;
    if state.is_shutting_down() {
        return;
    }

    let label = roster
        .name_of(id)
        .map(str::to_string)
        .unwrap_or_else(|| origin.ip().to_string());
    let line = envelope.stamp(Timestamp::now(), label).chat_line();

    roster.broadcast(&line);
    state.log.append(&line);
}

/// Removes the session from the roster and, if it was there, tells
/// everyone once. A session already removed by `/disconnect` or by
/// shutdown is not announced again.
async fn leave(state: &ServerState, id: ConnectionId) {
    let mut roster = state.roster.lock().await;
    let Some(entry) = roster.unregister(id) else {
        return;
    };

    let notice = lines::disconnected(entry.name());
    roster.broadcast(&notice);
    roster.broadcast(&roster.directory_line());
    state.log.append(&notice);
}

#[cfg(test)]
mod tests {
    use chatrelay_protocol::PlainTextCodec;
    use chatrelay_transport::TransportError;
    use tokio::sync::{Mutex, mpsc};

    use super::*;
    use crate::{NullChatLog, ServerConfig, TracingHelpViewer};

    /// A connection backed by channels: the test plays the client.
    struct MemoryConnection {
        id: ConnectionId,
        inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    }

    impl Connection for MemoryConnection {
        type Error = TransportError;

        async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
            self.outbound.send(data.to_vec()).map_err(|_| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "client gone",
                ))
            })
        }

        async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
            Ok(self.inbound.lock().await.recv().await)
        }

        async fn close(&self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            self.id
        }

        fn peer_addr(&self) -> SocketAddr {
            SocketAddr::from(([10, 0, 0, 1], 5000))
        }
    }

    struct Client {
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    fn memory_pair() -> (MemoryConnection, Client) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let conn = MemoryConnection {
            id: ConnectionId::next(),
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
        };
        (conn, Client { tx: in_tx, rx: out_rx })
    }

    fn state_with_idle(idle: Option<Duration>) -> Arc<ServerState> {
        let config = ServerConfig {
            idle_timeout: idle,
            ..ServerConfig::default()
        };
        Arc::new(ServerState::new(
            config,
            Arc::new(NullChatLog),
            Arc::new(TracingHelpViewer),
        ))
    }

    async fn observer(state: &ServerState, name: &str) -> OutboundReceiver {
        let id = ConnectionId::next();
        let (writer, rx) = OutboundWriter::channel(id);
        state
            .roster
            .lock()
            .await
            .register(id, SocketAddr::from(([10, 0, 0, 2], 5000)), name, writer)
            .unwrap();
        rx
    }

    fn lines_of(rx: &mut OutboundReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let Outbound::Line(line) = item {
                lines.push(line);
            }
        }
        lines
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_is_closed_and_announced_once() {
        let state = state_with_idle(Some(Duration::from_secs(30)));
        let mut b = observer(&state, "B").await;
        let (conn, mut client) = memory_pair();
        client.tx.send(b"/connect A".to_vec()).unwrap();

        let started = tokio::time::Instant::now();
        let end = handle_connection(conn, Arc::clone(&state), Arc::new(PlainTextCodec)).await;

        assert_eq!(end, SessionEnd::IdleTimeout);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(client.rx.recv().await.unwrap(), b"/join A");

        let seen = lines_of(&mut b);
        assert_eq!(
            seen.iter()
                .filter(|l| *l == "A has disconnected from the server")
                .count(),
            1
        );
        assert_eq!(seen.last().map(String::as_str), Some("/updatelist B"));
        assert!(state.roster.lock().await.lookup_by_name("A").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_keeps_idle_session_open() {
        let state = state_with_idle(Some(Duration::from_secs(30)));
        let (conn, Client { tx, mut rx }) = memory_pair();

        // Each gap is shorter than the timeout; the whole run is not.
        let chatter = tokio::spawn(async move {
            for body in ["/connect A", "hello", "again"] {
                tx.send(body.as_bytes().to_vec()).unwrap();
                tokio::time::sleep(Duration::from_secs(20)).await;
            }
        });

        let end = handle_connection(conn, Arc::clone(&state), Arc::new(PlainTextCodec)).await;
        chatter.await.unwrap();

        assert_eq!(end, SessionEnd::PeerClosed);
        assert_eq!(rx.recv().await.unwrap(), b"/join A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_idle_timeout_waits_indefinitely() {
        let state = state_with_idle(None);
        let (conn, _client) = memory_pair();

        let session = handle_connection(conn, state, Arc::new(PlainTextCodec));
        let result = tokio::time::timeout(Duration::from_secs(24 * 60 * 60), session).await;

        assert!(result.is_err(), "session ended on its own: {result:?}");
    }
}
