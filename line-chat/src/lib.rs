//! Multi-client line chat server.
//!
//! Clients connect over TCP, claim a name with `/joinAs`, and then chat in
//! public or privately using a newline-delimited text protocol. The modules
//! follow the path of a line through the server:
//!
//! - [`message`] reads and writes protocol lines and renders server replies.
//! - [`command`] classifies an inbound line by its first token.
//! - [`router`] is the per-connection state machine that acts on commands.
//! - [`registry`] is the lock-protected map of live [`session`]s.
//! - [`mailbox`] is the bounded outbound queue every session owns.
//! - [`broadcaster`] fans public and system messages out to every session.
//! - [`hub`] bundles the registry and broadcaster and owns session teardown.
//! - [`connection`] runs the reader and writer task for one stream.
//! - [`server`] allocates connection ids and runs the TCP accept loop.
//! - [`cli`], [`config`] and [`client`] are the binary's glue.

pub mod broadcaster;
pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod mailbox;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
