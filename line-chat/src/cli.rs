use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::{mailbox, message};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server, accepting TCP connections.
    Server(ServerArgs),
    /// Connect to a server and relay lines between it and the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address the server should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:8888")]
    pub listen: SocketAddr,

    /// Queued outbound lines per session before it is disconnected as too slow.
    #[arg(long, default_value_t = mailbox::DEFAULT_CAPACITY)]
    pub mailbox_capacity: usize,

    /// Longest accepted inbound line in bytes.
    #[arg(long, default_value_t = message::DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,

    /// Time allowed for the closing notice when a session ends, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub farewell_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Address of the server to connect to.
    #[arg(long, default_value = "127.0.0.1:8888")]
    pub server: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let cli = Cli::parse_from(["line-chat", "server"]);
        let Command::Server(args) = cli.command else {
            panic!("expected server subcommand");
        };
        assert_eq!(args.listen, "127.0.0.1:8888".parse::<SocketAddr>().expect("addr"));
        assert_eq!(args.mailbox_capacity, mailbox::DEFAULT_CAPACITY);
        assert_eq!(args.max_line_bytes, message::DEFAULT_MAX_LINE_BYTES);
    }

    #[test]
    fn client_takes_server_address() {
        let cli = Cli::parse_from(["line-chat", "client", "--server", "10.0.0.1:9000"]);
        let Command::Client(args) = cli.command else {
            panic!("expected client subcommand");
        };
        assert_eq!(args.server, "10.0.0.1:9000".parse::<SocketAddr>().expect("addr"));
    }
}
