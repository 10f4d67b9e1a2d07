use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{SessionError, Violation};

pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

const HELP_TEXT: &[&str] = &[
    "* /help ->Get some help",
    "* /joinAs [name] ->Join the server and set username",
    "* /msg [username] [message] ->Private Chat",
    "* /users ->Check users",
    "* /quit ->Quit",
];

/// Everything the server ever writes to a client.
///
/// `Display` renders the text without the final newline; multi-line
/// messages use `\n` between their lines and are queued as one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Help,
    WrongFormat,
    MustJoinFirst,
    NameTaken { name: String },
    UserOffline,
    Users { names: Vec<String> },
    Private { from: String, text: String },
    Chat { name: String, text: String },
    Joined { name: String },
    Left { name: String },
    ShuttingDown,
    Farewell,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Help => f.write_str(&HELP_TEXT.join("\n")),
            ServerMessage::WrongFormat => f.write_str("Wrong command format!"),
            ServerMessage::MustJoinFirst => f.write_str("Use /joinAs [name] First!"),
            ServerMessage::NameTaken { name } => write!(f, "Name {name} is already taken!"),
            ServerMessage::UserOffline => f.write_str("User isn't online"),
            ServerMessage::Users { names } => {
                write!(f, "{} user online currently", names.len())?;
                for name in names {
                    write!(f, "\n{name}")?;
                }
                Ok(())
            }
            ServerMessage::Private { from, text } => write!(f, "From {from} privately: {text}"),
            ServerMessage::Chat { name, text } => write!(f, "{name} say: {text}"),
            ServerMessage::Joined { name } => write!(f, "{name} joined the server"),
            ServerMessage::Left { name } => write!(f, "{name} left the server"),
            ServerMessage::ShuttingDown => f.write_str("Server is shutting down"),
            ServerMessage::Farewell => f.write_str("Connection closed!"),
        }
    }
}

impl From<ServerMessage> for String {
    fn from(message: ServerMessage) -> Self {
        message.to_string()
    }
}

/// Reads one `\n`-terminated line.
///
/// Returns `Ok(None)` on a clean EOF between lines. Bytes followed by EOF
/// without a newline count as a lost connection, not a command. Exactly one
/// delimiter is stripped; `\r\n` counts as one.
pub async fn read_line<R>(reader: &mut R, max_bytes: usize) -> Result<Option<String>, SessionError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = u64::try_from(max_bytes)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(limit)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&b'\n') {
        if buf.len() > max_bytes {
            return Err(Violation::LineTooLong { limit: max_bytes }.into());
        }
        return Err(SessionError::ConnectionLost(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed in the middle of a line",
        )));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| Violation::InvalidUtf8.into())
}

pub async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = Vec::with_capacity(line.len() + 1);
    encoded.extend_from_slice(line.as_bytes());
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;

    use super::*;

    async fn read_all(input: &[u8], max_bytes: usize) -> Vec<Result<Option<String>, String>> {
        let mut reader = BufReader::new(input);
        let mut lines = Vec::new();
        loop {
            match read_line(&mut reader, max_bytes).await {
                Ok(None) => {
                    lines.push(Ok(None));
                    return lines;
                }
                Ok(line) => lines.push(Ok(line)),
                Err(err) => {
                    lines.push(Err(err.to_string()));
                    return lines;
                }
            }
        }
    }

    #[tokio::test]
    async fn strips_exactly_one_delimiter() {
        let lines = read_all(b"hello  world \n/users\r\n\n", 64).await;
        assert_eq!(
            lines,
            vec![
                Ok(Some("hello  world ".to_string())),
                Ok(Some("/users".to_string())),
                Ok(Some(String::new())),
                Ok(None),
            ]
        );
    }

    #[tokio::test]
    async fn unterminated_tail_is_connection_loss() {
        let mut reader = BufReader::new(&b"/joinAs alice\n/quit"[..]);
        assert_eq!(
            read_line(&mut reader, 64).await.expect("first line"),
            Some("/joinAs alice".to_string())
        );
        let err = read_line(&mut reader, 64)
            .await
            .expect_err("partial line must fail");
        assert!(matches!(err, SessionError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn oversized_line_is_a_violation() {
        let mut reader = BufReader::new(&b"0123456789\n"[..]);
        let err = read_line(&mut reader, 4)
            .await
            .expect_err("line longer than limit");
        assert!(matches!(
            err,
            SessionError::ProtocolViolation(Violation::LineTooLong { limit: 4 })
        ));

        let mut reader = BufReader::new(&b"0123\n"[..]);
        assert_eq!(
            read_line(&mut reader, 4).await.expect("line at the limit"),
            Some("0123".to_string())
        );
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_violation() {
        let mut reader = BufReader::new(&b"\xff\xfe\n"[..]);
        let err = read_line(&mut reader, 64).await.expect_err("bad utf8");
        assert!(matches!(
            err,
            SessionError::ProtocolViolation(Violation::InvalidUtf8)
        ));
    }

    #[tokio::test]
    async fn write_line_appends_newline() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut reader = BufReader::new(reader);

        write_line(&mut writer, "alice say: hi")
            .await
            .expect("write line");
        let line = read_line(&mut reader, 64).await.expect("read line");
        assert_eq!(line.as_deref(), Some("alice say: hi"));
    }

    #[test]
    fn renders_wire_text() {
        assert_eq!(
            ServerMessage::Users {
                names: vec!["alice".into(), "bob".into()]
            }
            .to_string(),
            "2 user online currently\nalice\nbob"
        );
        assert_eq!(
            ServerMessage::Private {
                from: "alice".into(),
                text: "hi  there".into()
            }
            .to_string(),
            "From alice privately: hi  there"
        );
        assert!(ServerMessage::Help.to_string().starts_with("* /help"));
    }
}
