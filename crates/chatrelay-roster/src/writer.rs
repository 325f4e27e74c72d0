//! Outbound writers: the per-connection sink for lines bound to one client.
//!
//! A writer is the sending half of an unbounded mpsc channel. The
//! receiving half belongs to the connection's writer task, which is the
//! only thing that ever touches the socket's write side. Sending never
//! waits, so a writer can be used while the roster lock is held without
//! stalling other sessions behind a slow client.

use chatrelay_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::RosterError;

/// One item in a writer's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text line to write to the client.
    Line(String),
    /// Flush what is queued ahead of this, then close the connection.
    Close,
}

/// The receiving half, owned by the connection's writer task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Cheap-to-clone handle for queueing lines to one client.
///
/// The session owns the original; the roster keeps a clone so the
/// broadcast bus and the command engine can reach the client.
#[derive(Debug, Clone)]
pub struct OutboundWriter {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl OutboundWriter {
    /// Creates a writer for `id` and the receiver its writer task drains.
    pub fn channel(id: ConnectionId) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    /// The connection this writer delivers to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues one line.
    ///
    /// # Errors
    /// [`RosterError::PeerIoFailure`] if the writer task has already
    /// exited (the client's socket failed or the session closed).
    pub fn send_line(&self, line: impl Into<String>) -> Result<(), RosterError> {
        self.tx
            .send(Outbound::Line(line.into()))
            .map_err(|_| RosterError::PeerIoFailure(self.id))
    }

    /// Asks the writer task to flush and close the connection.
    ///
    /// Lines queued after this are never written.
    pub fn close(&self) {
        // Already gone is as good as closed.
        let _ = self.tx.send(Outbound::Close);
    }

    /// Resolves once the writer task has exited and dropped its receiver.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// True once the writer task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_line_queues_in_order() {
        let (writer, mut rx) = OutboundWriter::channel(ConnectionId::new(1));

        writer.send_line("first").unwrap();
        writer.send_line(String::from("second")).unwrap();
        writer.close();

        assert_eq!(rx.try_recv().unwrap(), Outbound::Line("first".into()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Line("second".into()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
    }

    #[test]
    fn test_send_line_after_receiver_dropped_is_peer_io_failure() {
        let (writer, rx) = OutboundWriter::channel(ConnectionId::new(9));
        drop(rx);

        assert!(writer.is_closed());
        assert_eq!(
            writer.send_line("lost"),
            Err(RosterError::PeerIoFailure(ConnectionId::new(9)))
        );
    }

    #[tokio::test]
    async fn test_closed_resolves_when_receiver_dropped() {
        let (writer, rx) = OutboundWriter::channel(ConnectionId::new(2));
        let watcher = writer.clone();
        let waiting = tokio::spawn(async move { watcher.closed().await });

        drop(rx);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiting)
            .await
            .expect("closed() should resolve")
            .unwrap();
    }
}
