//! The leading-slash command grammar.
//!
//! A chat line whose body starts with [`COMMAND_SIGIL`] is a command. The
//! first space-delimited token (case-sensitive) names it; the remaining
//! tokens are its arguments. Parsing never fails with a panic: bad input
//! becomes a [`CommandError`] whose `Display` text is the reply line the
//! caller sees.

/// The character that marks a line as a command rather than chat.
pub const COMMAND_SIGIL: char = '/';

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connect <name>`: join the roster under `name`.
    Connect { name: String },
    /// `/disconnect`: leave and close the session.
    Disconnect,
    /// `/nick <name>`: change display name.
    Nick { name: String },
    /// `/whois <name>`: ask for a user's origin address.
    Whois { name: String },
    /// `/msg <name> <text…>`: whisper to one user.
    Msg { target: String, text: String },
    /// `/me <text…>`: third-person action line.
    Me { text: String },
    /// `/slap <name>`: the trout.
    Slap { target: String },
    /// `/cmdlist`: static help text.
    CmdList,
    /// `/help`: hand off to the help viewer.
    Help,
}

impl Command {
    /// Parses the text that followed the sigil.
    ///
    /// # Errors
    /// - [`CommandError::UnknownCommand`] if the first token is not a
    ///   recognised command name.
    /// - [`CommandError::MissingParameter`] if a required argument is absent.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let (name, rest) = next_token(text).unwrap_or(("", ""));

        match name {
            "connect" => Ok(Self::Connect {
                name: required_token(rest, "connect")?.to_string(),
            }),
            "disconnect" => Ok(Self::Disconnect),
            "nick" => Ok(Self::Nick {
                name: required_token(rest, "nick")?.to_string(),
            }),
            "whois" => Ok(Self::Whois {
                name: required_token(rest, "whois")?.to_string(),
            }),
            "msg" => {
                let (target, body) = next_token(rest)
                    .ok_or(CommandError::MissingParameter("msg"))?;
                Ok(Self::Msg {
                    target: target.to_string(),
                    text: required_text(body, "msg")?.to_string(),
                })
            }
            "me" => Ok(Self::Me {
                text: required_text(rest, "me")?.to_string(),
            }),
            "slap" => Ok(Self::Slap {
                target: required_token(rest, "slap")?.to_string(),
            }),
            "cmdlist" => Ok(Self::CmdList),
            "help" => Ok(Self::Help),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    /// The command's name as typed, without the sigil.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::Nick { .. } => "nick",
            Self::Whois { .. } => "whois",
            Self::Msg { .. } => "msg",
            Self::Me { .. } => "me",
            Self::Slap { .. } => "slap",
            Self::CmdList => "cmdlist",
            Self::Help => "help",
        }
    }
}

/// Splits off the first space-delimited token. `None` if only spaces remain.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start_matches(' ');
    if s.is_empty() {
        return None;
    }
    Some(s.split_once(' ').unwrap_or((s, "")))
}

fn required_token<'a>(
    rest: &'a str,
    command: &'static str,
) -> Result<&'a str, CommandError> {
    next_token(rest)
        .map(|(token, _)| token)
        .ok_or(CommandError::MissingParameter(command))
}

fn required_text<'a>(
    rest: &'a str,
    command: &'static str,
) -> Result<&'a str, CommandError> {
    let text = rest.trim();
    if text.is_empty() {
        return Err(CommandError::MissingParameter(command));
    }
    Ok(text)
}

/// Caller-facing command failures.
///
/// None of these ever end a session. The server renders the error with
/// `to_string()` and sends it to the caller only; roster state is left
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The leading token is not a command this server knows.
    #[error("Unrecognised command \"{0}\"")]
    UnknownCommand(String),

    /// A required argument was not supplied.
    #[error("Missing parameter for command {0}")]
    MissingParameter(&'static str),

    /// The requested name already belongs to another user.
    #[error("Username {0} is already in use!")]
    NameConflict(String),

    /// A private message addressed to its own sender.
    #[error("Cannot whisper to yourself!")]
    SelfTarget,

    /// The named user is not in the roster.
    #[error("User {0} is not connected to the server.")]
    UnknownUser(String),

    /// The command needs a registered name and the caller has none yet.
    #[error("You must /connect before using /{0}")]
    NotConnected(&'static str),

    /// `/connect` from a session that already has a name.
    #[error("You are already connected as {0}")]
    AlreadyConnected(String),

    /// The name is empty or contains a comma or whitespace.
    #[error("Invalid name \"{0}\": names cannot be empty or contain commas or spaces")]
    InvalidName(String),
}
