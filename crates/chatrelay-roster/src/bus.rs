//! Broadcast bus: fan-out of one line to registered writers.
//!
//! Delivery is best effort. A writer whose task has gone away is logged
//! and skipped; it never stops delivery to the others and never becomes
//! an error for the caller. The failed session notices on its own (its
//! `OutboundWriter::closed()` resolves) and runs its normal teardown,
//! which removes it from the roster.

use chatrelay_transport::ConnectionId;

use crate::{OutboundWriter, Roster, RosterError};

/// What happened to one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Number of writers the line was queued on.
    pub delivered: usize,
    /// Writers whose task had already exited.
    pub failed: Vec<ConnectionId>,
}

impl Roster {
    /// Delivers `line` to every writer registered right now.
    ///
    /// Sessions registered after this call returns do not get the line.
    pub fn broadcast(&self, line: &str) -> Delivery {
        let mut delivery = Delivery::default();
        for entry in self.entries() {
            if unicast(entry.writer(), line) {
                delivery.delivered += 1;
            } else {
                delivery.failed.push(entry.writer().id());
            }
        }
        delivery
    }

    /// Delivers `line` to the writer registered for `id`.
    ///
    /// # Errors
    /// - [`RosterError::NotRegistered`] if `id` has no entry.
    /// - [`RosterError::PeerIoFailure`] if its writer is gone (also logged).
    pub fn unicast_to(
        &self,
        id: ConnectionId,
        line: &str,
    ) -> Result<(), RosterError> {
        let entry = self.get(id).ok_or(RosterError::NotRegistered(id))?;
        if unicast(entry.writer(), line) {
            Ok(())
        } else {
            Err(RosterError::PeerIoFailure(id))
        }
    }
}

/// Delivers `line` to exactly one writer. Returns `false` (after logging)
/// if the writer is gone.
pub fn unicast(writer: &OutboundWriter, line: &str) -> bool {
    match writer.send_line(line) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(conn_id = %writer.id(), error = %e, "dropping line for dead writer");
            false
        }
    }
}
