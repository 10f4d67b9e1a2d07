use std::time::Duration;

use crate::{cli::ServerArgs, mailbox, message};

/// Runtime knobs for the session core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Lines a session may have queued before it is treated as a slow consumer
    /// and disconnected.
    pub mailbox_capacity: usize,
    /// Longest accepted inbound line, delimiter excluded.
    pub max_line_bytes: usize,
    /// Upper bound on flushing queued lines plus the farewell during teardown.
    pub farewell_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: mailbox::DEFAULT_CAPACITY,
            max_line_bytes: message::DEFAULT_MAX_LINE_BYTES,
            farewell_timeout: Duration::from_secs(1),
        }
    }
}

impl From<&ServerArgs> for ServerConfig {
    fn from(args: &ServerArgs) -> Self {
        Self {
            mailbox_capacity: args.mailbox_capacity,
            max_line_bytes: args.max_line_bytes,
            farewell_timeout: Duration::from_millis(args.farewell_timeout_ms),
        }
    }
}
