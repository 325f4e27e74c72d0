//! Command engine: runs one parsed command against the roster.
//!
//! [`dispatch`] is synchronous and does no I/O beyond queueing lines on
//! outbound writers, which never waits. The session calls it with the
//! roster lock held, so each command (check, mutate, notify) is one
//! critical section: two sessions cannot both pass the uniqueness check
//! for the same name, and every client sees one command's lines in the
//! order the handler issued them.
//!
//! Failures come back as a [`CommandError`]. The session turns them into a
//! reply to the caller and carries on; nothing here can end a session
//! except `/disconnect`.

use std::net::SocketAddr;

use chatrelay_protocol::{Command, CommandError, lines};
use chatrelay_roster::{OutboundWriter, Roster, RosterError, unicast};
use chatrelay_transport::ConnectionId;

use crate::server::ServerState;
use crate::{ChatLog, HelpViewer};

/// The session a command came from.
pub(crate) struct Caller<'a> {
    pub(crate) id: ConnectionId,
    pub(crate) origin: SocketAddr,
    pub(crate) writer: &'a OutboundWriter,
}

/// External sinks a command may feed.
pub(crate) struct Collaborators<'a> {
    pub(crate) log: &'a dyn ChatLog,
    pub(crate) help: &'a dyn HelpViewer,
}

/// What the session should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Continue,
    Close,
}

/// Parses and runs one command line for `caller`, replying to the caller
/// alone if it fails.
///
/// The roster lock is held from the shutdown check to the last queued
/// line, so a command never lands after the server's final notice.
pub(crate) async fn execute(
    state: &ServerState,
    caller: &Caller<'_>,
    text: &str,
) -> Disposition {
    let command = match Command::parse(text) {
        Ok(command) => command,
        Err(e) => {
            unicast(caller.writer, &e.to_string());
            return Disposition::Continue;
        }
    };
    tracing::debug!(conn_id = %caller.id, command = command.name(), "command");

    let mut roster = state.roster.lock().await;
    if state.is_shutting_down() {
        return Disposition::Close;
    }

    let collab = Collaborators {
        log: state.log.as_ref(),
        help: state.help.as_ref(),
    };
    match dispatch(&mut roster, caller, command, &collab) {
        Ok(disposition) => disposition,
        Err(e) => {
            tracing::debug!(conn_id = %caller.id, error = %e, "command rejected");
            unicast(caller.writer, &e.to_string());
            Disposition::Continue
        }
    }
}

/// Executes `command` for `caller`.
pub(crate) fn dispatch(
    roster: &mut Roster,
    caller: &Caller<'_>,
    command: Command,
    collab: &Collaborators<'_>,
) -> Result<Disposition, CommandError> {
    match command {
        Command::Connect { name } => connect(roster, caller, &name, collab),
        Command::Disconnect => Ok(disconnect(roster, caller, collab)),
        Command::Nick { name } => nick(roster, caller, &name, collab),
        Command::Whois { name } => {
            let reply = match roster.lookup_by_name(&name).and_then(|id| roster.get(id)) {
                Some(entry) => lines::whois(&name, &entry.origin().ip().to_string()),
                None => lines::NOT_PRESENT.to_string(),
            };
            unicast(caller.writer, &reply);
            Ok(Disposition::Continue)
        }
        Command::Msg { target, text } => whisper(roster, caller, &target, &text, collab),
        Command::Me { text } => {
            let sender = registered_name(roster, caller, "me")?;
            let line = lines::emote(&sender, &text);
            roster.broadcast(&line);
            collab.log.append(&line);
            Ok(Disposition::Continue)
        }
        Command::Slap { target } => {
            let sender = registered_name(roster, caller, "slap")?;
            if roster.lookup_by_name(&target).is_none() {
                return Err(CommandError::UnknownUser(target));
            }
            let line = lines::slap(&sender, &target);
            roster.broadcast(&line);
            collab.log.append(&line);
            Ok(Disposition::Continue)
        }
        Command::CmdList => {
            for line in lines::CMDLIST {
                unicast(caller.writer, line);
            }
            Ok(Disposition::Continue)
        }
        Command::Help => {
            let requester = roster
                .name_of(caller.id)
                .map(str::to_string)
                .unwrap_or_else(|| caller.origin.ip().to_string());
            collab.help.show(&requester);
            Ok(Disposition::Continue)
        }
    }
}

fn connect(
    roster: &mut Roster,
    caller: &Caller<'_>,
    requested: &str,
    collab: &Collaborators<'_>,
) -> Result<Disposition, CommandError> {
    if let Some(current) = roster.name_of(caller.id) {
        return Err(CommandError::AlreadyConnected(current.to_string()));
    }

    let name = roster
        .register(caller.id, caller.origin, requested, caller.writer.clone())
        .map_err(|e| reject(e, "connect"))?;

    if name != requested {
        unicast(caller.writer, &lines::name_taken(&name));
        unicast(caller.writer, &lines::nick(&name));
    }
    unicast(caller.writer, &lines::join(&name));

    let notice = lines::connected(&name, &caller.origin.ip().to_string());
    roster.broadcast(&notice);
    roster.broadcast(&roster.directory_line());
    collab.log.append(&notice);

    Ok(Disposition::Continue)
}

fn disconnect(
    roster: &mut Roster,
    caller: &Caller<'_>,
    collab: &Collaborators<'_>,
) -> Disposition {
    if let Some(entry) = roster.unregister(caller.id) {
        let notice = lines::disconnected(entry.name());
        roster.broadcast(&notice);
        roster.broadcast(&roster.directory_line());
        collab.log.append(&notice);
    }
    unicast(caller.writer, lines::DISCONNECT);
    Disposition::Close
}

fn nick(
    roster: &mut Roster,
    caller: &Caller<'_>,
    new_name: &str,
    collab: &Collaborators<'_>,
) -> Result<Disposition, CommandError> {
    registered_name(roster, caller, "nick")?;
    let old = roster
        .rename(caller.id, new_name)
        .map_err(|e| reject(e, "nick"))?;

    unicast(caller.writer, &lines::nick(new_name));
    if old == new_name {
        return Ok(Disposition::Continue);
    }

    let notice = lines::renamed(&old, new_name);
    roster.broadcast(&notice);
    roster.broadcast(&roster.directory_line());
    collab.log.append(&notice);

    Ok(Disposition::Continue)
}

fn whisper(
    roster: &mut Roster,
    caller: &Caller<'_>,
    target: &str,
    text: &str,
    collab: &Collaborators<'_>,
) -> Result<Disposition, CommandError> {
    let sender = registered_name(roster, caller, "msg")?;
    if target == sender {
        return Err(CommandError::SelfTarget);
    }
    let target_id = roster
        .lookup_by_name(target)
        .ok_or_else(|| CommandError::UnknownUser(target.to_string()))?;

    unicast(caller.writer, &lines::whisper_echo(target, text));
    // A dead target is logged by the bus and cleaned up by its own session.
    let _ = roster.unicast_to(target_id, &lines::whisper(&sender, text));
    collab.log.append(&lines::whisper_log(&sender, target, text));

    Ok(Disposition::Continue)
}

/// The caller's current name, or `NotConnected` naming `command`.
fn registered_name(
    roster: &Roster,
    caller: &Caller<'_>,
    command: &'static str,
) -> Result<String, CommandError> {
    roster
        .name_of(caller.id)
        .map(str::to_string)
        .ok_or(CommandError::NotConnected(command))
}

fn reject(err: RosterError, command: &'static str) -> CommandError {
    match err {
        RosterError::NameConflict(name) => CommandError::NameConflict(name),
        RosterError::InvalidName(name) => CommandError::InvalidName(name),
        RosterError::NotRegistered(_) => CommandError::NotConnected(command),
        RosterError::AlreadyRegistered(id) => CommandError::AlreadyConnected(id.to_string()),
        RosterError::PeerIoFailure(_) => CommandError::NotConnected(command),
    }
}
