use crate::error::CommandError;

pub const HELP: &str = "/help";
pub const JOIN_AS: &str = "/joinAs";
pub const MSG: &str = "/msg";
pub const USERS: &str = "/users";
pub const QUIT: &str = "/quit";

/// One inbound line, classified by its first whitespace-delimited token.
///
/// Arguments are kept raw; whether they are well formed depends on the
/// session state, so validation happens in [`parse_join_args`] and
/// [`parse_msg_args`] once the router knows the command applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    JoinAs(&'a str),
    Msg(&'a str),
    Users,
    Quit,
    Text(&'a str),
}

impl<'a> Command<'a> {
    /// `None` for blank lines.
    pub fn parse(line: &'a str) -> Option<Self> {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            return None;
        }

        let (keyword, args) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));

        let command = match keyword {
            HELP => Command::Help,
            JOIN_AS => Command::JoinAs(args),
            MSG => Command::Msg(args),
            USERS => Command::Users,
            QUIT => Command::Quit,
            _ => Command::Text(line),
        };
        Some(command)
    }
}

/// `/joinAs` takes exactly one argument: the name.
pub fn parse_join_args(args: &str) -> Result<&str, CommandError> {
    let mut tokens = args.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(name), None) => Ok(name),
        _ => Err(CommandError::Format(JOIN_AS)),
    }
}

/// `/msg` takes a target name followed by at least one word of text. The text
/// keeps its inner whitespace.
pub fn parse_msg_args(args: &str) -> Result<(&str, &str), CommandError> {
    let (target, text) = args
        .trim_start()
        .split_once(char::is_whitespace)
        .ok_or(CommandError::Format(MSG))?;
    let text = text.trim_start();
    if text.trim_end().is_empty() {
        return Err(CommandError::Format(MSG));
    }
    Ok((target, text))
}
