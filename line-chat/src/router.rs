use tracing::{debug, info};

use crate::{
    command::{Command, parse_join_args, parse_msg_args},
    error::{LoginError, MailboxError, RouteError},
    hub::Hub,
    message::ServerMessage,
    session::{ConnectionId, SessionHandle},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Unauthenticated,
    Authenticated { name: String },
    Closed,
}

/// What the reader loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Per-connection protocol state machine.
///
/// Replies to the caller go through the caller's own mailbox so they are
/// ordered with broadcasts by the same writer. A failed reply means the
/// session is gone or cannot keep up; the caller should tear it down.
pub struct CommandRouter {
    hub: Hub,
    session: SessionHandle,
    state: RouterState,
}

impl CommandRouter {
    pub fn new(hub: Hub, session: SessionHandle) -> Self {
        Self {
            hub,
            session,
            state: RouterState::Unauthenticated,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.session.id()
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow, MailboxError> {
        let Some(command) = Command::parse(line) else {
            return Ok(Flow::Continue);
        };

        let name = match &self.state {
            RouterState::Closed => return Ok(Flow::Close),
            RouterState::Unauthenticated => None,
            RouterState::Authenticated { name } => Some(name.clone()),
        };

        match name {
            None => self.handle_unauthenticated(command).await,
            Some(name) => self.handle_authenticated(&name, command, line).await,
        }
    }

    async fn handle_unauthenticated(
        &mut self,
        command: Command<'_>,
    ) -> Result<Flow, MailboxError> {
        match command {
            Command::Help => self.reply(ServerMessage::Help)?,
            Command::JoinAs(args) => match parse_join_args(args) {
                Ok(name) => self.join(name).await?,
                Err(_) => self.reply(ServerMessage::WrongFormat)?,
            },
            _ => self.reply(ServerMessage::MustJoinFirst)?,
        }
        Ok(Flow::Continue)
    }

    async fn handle_authenticated(
        &mut self,
        name: &str,
        command: Command<'_>,
        line: &str,
    ) -> Result<Flow, MailboxError> {
        match command {
            Command::Help => self.reply(ServerMessage::Help)?,
            Command::Msg(args) => match parse_msg_args(args) {
                Ok((target, text)) => {
                    if let Err(err) = self.send_private(name, target, text).await {
                        debug!(
                            conn = self.connection_id(),
                            error = %err,
                            "private message not delivered"
                        );
                        self.reply(ServerMessage::UserOffline)?;
                    }
                }
                Err(_) => self.reply(ServerMessage::WrongFormat)?,
            },
            Command::Users => {
                let names = self
                    .hub
                    .registry()
                    .snapshot()
                    .await
                    .iter()
                    .filter_map(|session| session.name().map(str::to_string))
                    .collect();
                self.reply(ServerMessage::Users { names })?;
            }
            Command::Quit => {
                self.hub.teardown(self.connection_id()).await;
                self.state = RouterState::Closed;
                return Ok(Flow::Close);
            }
            Command::JoinAs(_) | Command::Text(_) => {
                // Evicted while this line was in flight; its `left` is already out.
                if self.session.is_closed() {
                    self.state = RouterState::Closed;
                    return Ok(Flow::Close);
                }
                self.hub.broadcaster().publish(ServerMessage::Chat {
                    name: name.to_string(),
                    text: line.to_string(),
                });
            }
        }
        Ok(Flow::Continue)
    }

    async fn join(&mut self, name: &str) -> Result<(), MailboxError> {
        match self
            .hub
            .registry()
            .complete_login(self.connection_id(), name)
            .await
        {
            Ok(()) => {
                info!(conn = self.connection_id(), name, "session joined");
                self.state = RouterState::Authenticated {
                    name: name.to_string(),
                };
                self.hub.broadcaster().publish(ServerMessage::Joined {
                    name: name.to_string(),
                });
                Ok(())
            }
            Err(LoginError::NameTaken(name)) => self.reply(ServerMessage::NameTaken { name }),
            // Removed underneath us by a concurrent teardown.
            Err(LoginError::NotRegistered(_)) => Err(MailboxError::Closed),
            Err(LoginError::AlreadyLoggedIn(_)) => Ok(()),
        }
    }

    async fn send_private(&self, from: &str, target: &str, text: &str) -> Result<(), RouteError> {
        let offline = || RouteError::UserOffline(target.to_string());
        let recipient = self.hub.registry().lookup(target).await.ok_or_else(offline)?;

        let message = ServerMessage::Private {
            from: from.to_string(),
            text: text.to_string(),
        };
        match recipient.deliver(message) {
            Ok(()) => Ok(()),
            Err(MailboxError::Full) => {
                info!(conn = recipient.id(), "mailbox full, disconnecting slow session");
                self.hub.teardown(recipient.id()).await;
                Err(offline())
            }
            Err(MailboxError::Closed) => Err(offline()),
        }
    }

    fn reply(&self, message: ServerMessage) -> Result<(), MailboxError> {
        self.session.deliver(message)
    }
}
