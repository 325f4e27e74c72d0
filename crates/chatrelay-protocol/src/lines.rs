//! Builders for every line the server pushes to clients.
//!
//! Two kinds of line share one stream: control lines that start with the
//! sigil (`/updatelist`, `/join`, `/nick`, `/disconnect`), which clients
//! act on, and human-readable notices, which clients just display.

/// Pushed when the server closes a client's session.
pub const DISCONNECT: &str = "/disconnect";

/// Reply to `/whois` for a name nobody holds.
pub const NOT_PRESENT: &str = "The user is not present in the channel";

/// Final notice before the shutdown `/disconnect`.
pub const SERVER_CLOSED: &str = "Server closed.";

/// Reply to `/cmdlist`, one entry per line.
pub const CMDLIST: &[&str] = &[
    " /disconnect - disconnect from server",
    " /whois <NICK> - obtain client IP for <NICK>",
    " /msg <NICK> <MESSAGE> - send private messages to <NICK>",
    " /nick <NAME> - change nick to <NAME>",
    " /me <EMOTE> - emote a message that will start with your name",
    " /slap <NAME> - perform the slap emote",
    " /help - open the help text",
];

/// Directory update: `/updatelist a,b,c`.
///
/// Names never contain commas, so the join needs no escaping.
pub fn directory_update<S: AsRef<str>>(names: &[S]) -> String {
    let joined: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    format!("/updatelist {}", joined.join(","))
}

/// Tells a client the name it was registered under.
pub fn join(name: &str) -> String {
    format!("/join {name}")
}

/// Tells a client its own name changed.
pub fn nick(name: &str) -> String {
    format!("/nick {name}")
}

/// Tells a `/connect` caller it was given a disambiguated name.
pub fn name_taken(assigned: &str) -> String {
    format!("Your username is already in use and has been changed to {assigned}")
}

/// Broadcast when a session registers; `origin` is the peer IP.
pub fn connected(name: &str, origin: &str) -> String {
    format!("{name} has connected to the server from {origin}")
}

/// Broadcast once when a named session leaves.
pub fn disconnected(name: &str) -> String {
    format!("{name} has disconnected from the server")
}

/// Broadcast after a `/nick` that changes the name.
pub fn renamed(old: &str, new: &str) -> String {
    format!("{old} is now known as {new}")
}

/// Reply to `/whois`. The two spaces are part of the format.
pub fn whois(name: &str, origin: &str) -> String {
    format!("{name}:  {origin}")
}

/// Echo shown to the sender of a whisper.
pub fn whisper_echo(target: &str, text: &str) -> String {
    format!("You whisper to {target}: {text}")
}

/// What the recipient of a whisper sees.
pub fn whisper(sender: &str, text: &str) -> String {
    format!("{sender} whispers : {text}")
}

/// The chat-log record of a whisper.
pub fn whisper_log(sender: &str, target: &str, text: &str) -> String {
    format!("{sender}->{target} : {text}")
}

/// Broadcast for `/me`.
pub fn emote(name: &str, text: &str) -> String {
    format!("#  {name} {text}")
}

/// Broadcast for `/slap`.
pub fn slap(name: &str, target: &str) -> String {
    format!("#  {name} slaps {target} around a bit with a large trout")
}

/// First notice of a shutdown countdown.
pub fn shutdown_announced(secs: u64) -> String {
    format!("Server has received a shutdown request and will shut down in {secs} seconds.")
}

/// Countdown tick, sent while seconds remain.
pub fn shutdown_countdown(secs: u64) -> String {
    format!("{secs}s until server shutdown")
}
