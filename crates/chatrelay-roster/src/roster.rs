//! The roster: tracks every session that has completed `/connect`.
//!
//! For each registered connection the roster knows its display name, the
//! address it connected from, and its [`OutboundWriter`]. Name and writer
//! live in the same [`RosterEntry`], so they are added and removed as a
//! pair and a reader can never see one without the other.
//!
//! # Concurrency note
//!
//! `Roster` is NOT thread-safe by itself; it uses plain `HashMap`s. The
//! server keeps exactly one roster behind one `tokio::sync::Mutex` and
//! runs each logical operation (check-then-register, rename, broadcast)
//! as a single critical section. That is what stops two sessions from
//! both passing the uniqueness check for the same name.

use std::collections::HashMap;
use std::net::SocketAddr;

use chatrelay_protocol::lines;
use chatrelay_transport::ConnectionId;

use crate::{OutboundWriter, RosterError};

/// Appended to a requested name until it no longer collides.
pub const CLONE_SUFFIX: &str = "_clone";

/// One registered session.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    name: String,
    origin: SocketAddr,
    writer: OutboundWriter,
}

impl RosterEntry {
    /// Current display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the connection was accepted from.
    pub fn origin(&self) -> SocketAddr {
        self.origin
    }

    /// Handle for delivering lines to this session's client.
    pub fn writer(&self) -> &OutboundWriter {
        &self.writer
    }
}

/// Directory of currently connected, named sessions.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ [named] ──→ rename() ──→ [renamed] ──→ unregister()
///                    │                                      ▲
///                    └──────────────────────────────────────┘
/// ```
#[derive(Debug, Default)]
pub struct Roster {
    /// All registered sessions, keyed by connection identity.
    entries: HashMap<ConnectionId, RosterEntry>,

    /// Index from display name to identity, kept in sync with `entries`.
    by_name: HashMap<String, ConnectionId>,

    /// Registration order, for stable directory listings.
    order: Vec<ConnectionId>,
}

impl Roster {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under `requested`, or under a disambiguated
    /// variant if that name is taken. Returns the name actually assigned.
    ///
    /// Disambiguation appends [`CLONE_SUFFIX`] until the name is free, so
    /// `Steve` becomes `Steve_clone`, then `Steve_clone_clone`.
    ///
    /// # Errors
    /// - [`RosterError::InvalidName`] if `requested` fails [`validate_name`].
    /// - [`RosterError::AlreadyRegistered`] if `id` already has an entry.
    pub fn register(
        &mut self,
        id: ConnectionId,
        origin: SocketAddr,
        requested: &str,
        writer: OutboundWriter,
    ) -> Result<String, RosterError> {
        validate_name(requested)?;
        if self.entries.contains_key(&id) {
            return Err(RosterError::AlreadyRegistered(id));
        }

        let mut name = requested.to_string();
        while self.by_name.contains_key(&name) {
            name.push_str(CLONE_SUFFIX);
        }

        self.by_name.insert(name.clone(), id);
        self.entries.insert(
            id,
            RosterEntry {
                name: name.clone(),
                origin,
                writer,
            },
        );
        self.order.push(id);

        tracing::info!(%id, %name, %origin, "registered");
        Ok(name)
    }

    /// Changes the display name of a registered session and returns the
    /// old one. The writer is untouched. Renaming to one's own current
    /// name succeeds and changes nothing.
    ///
    /// # Errors
    /// - [`RosterError::InvalidName`] if `new_name` fails [`validate_name`].
    /// - [`RosterError::NotRegistered`] if `id` has no entry.
    /// - [`RosterError::NameConflict`] if another identity holds `new_name`.
    pub fn rename(
        &mut self,
        id: ConnectionId,
        new_name: &str,
    ) -> Result<String, RosterError> {
        validate_name(new_name)?;
        if let Some(holder) = self.by_name.get(new_name) {
            if *holder != id {
                return Err(RosterError::NameConflict(new_name.to_string()));
            }
        }

        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(RosterError::NotRegistered(id))?;

        let old = std::mem::replace(&mut entry.name, new_name.to_string());
        self.by_name.remove(&old);
        self.by_name.insert(new_name.to_string(), id);

        tracing::info!(%id, %old, new = %new_name, "renamed");
        Ok(old)
    }

    /// Removes a session's entry, returning it if there was one.
    ///
    /// Idempotent: unregistering an unknown identity does nothing.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<RosterEntry> {
        let entry = self.entries.remove(&id)?;
        self.by_name.remove(&entry.name);
        self.order.retain(|other| *other != id);

        tracing::info!(%id, name = %entry.name, "unregistered");
        Some(entry)
    }

    /// Finds who currently holds `name`.
    pub fn lookup_by_name(&self, name: &str) -> Option<ConnectionId> {
        self.by_name.get(name).copied()
    }

    /// Looks up an entry by identity.
    pub fn get(&self, id: ConnectionId) -> Option<&RosterEntry> {
        self.entries.get(&id)
    }

    /// Current display name of `id`, if registered.
    pub fn name_of(&self, id: ConnectionId) -> Option<&str> {
        self.entries.get(&id).map(|entry| entry.name.as_str())
    }

    /// Returns `true` if `id` has an entry.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// All names in registration order.
    pub fn names_snapshot(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// The `/updatelist` line for the current roster.
    pub fn directory_line(&self) -> String {
        lines::directory_update(&self.names_snapshot())
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Returns the number of registered sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Checks that a display name is usable.
///
/// Names travel comma-joined in `/updatelist` and space-delimited in
/// commands, so neither character may appear in one.
pub fn validate_name(name: &str) -> Result<(), RosterError> {
    if name.is_empty() || name.contains(',') || name.chars().any(char::is_whitespace) {
        return Err(RosterError::InvalidName(name.to_string()));
    }
    Ok(())
}
