use std::{io::BufRead, thread};

use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    message::{DEFAULT_MAX_LINE_BYTES, read_line, write_line},
};

pub async fn run(args: ClientArgs) -> Result<()> {
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!("connected to {}", args.server);

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut input = spawn_stdin_reader();
    let mut stdout = tokio::io::stdout();

    relay(&mut reader, &mut writer, &mut input, &mut stdout).await
}

/// Reads terminal lines on a plain thread. A blocking stdin read cannot be
/// cancelled, and on a runtime blocking thread it would keep the process alive
/// after the server hangs up.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(error) = spawned {
        warn!(?error, "failed to spawn stdin reader, input disabled");
    }
    rx
}

/// Prints every server line and forwards every input line until the server
/// goes away. Once input runs dry the write side is shut down and the relay
/// keeps printing until the server closes the connection.
pub async fn relay<R, W, O>(
    server_reader: &mut R,
    server_writer: &mut W,
    input: &mut mpsc::UnboundedReceiver<String>,
    output: &mut O,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    O: AsyncWrite + Unpin,
{
    select! {
        printed = print_server_lines(server_reader, output) => printed,
        forwarded = forward_input(input, server_writer) => forwarded,
        ctrl_c = tokio::signal::ctrl_c() => {
            handle_ctrl_c(ctrl_c);
            Ok(())
        }
    }
}

async fn print_server_lines<R, O>(reader: &mut R, output: &mut O) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    loop {
        match read_line(reader, DEFAULT_MAX_LINE_BYTES).await {
            Ok(Some(text)) => write_line(output, &text).await?,
            Ok(None) | Err(_) => {
                write_line(output, "Connection lost").await?;
                return Ok(());
            }
        }
    }
}

/// Never finishes on its own after input EOF, so the relay keeps waiting for
/// the server to hang up.
async fn forward_input<W>(
    input: &mut mpsc::UnboundedReceiver<String>,
    writer: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = input.recv().await {
        write_line(writer, &line).await?;
    }

    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shutdown client writer cleanly");
    }
    std::future::pending::<()>().await;
    Ok(())
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}
