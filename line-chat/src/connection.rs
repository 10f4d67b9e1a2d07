//! The two tasks that serve one connection.
//!
//! The reader turns inbound lines into router calls. The writer drains the
//! session's mailbox onto the stream. Both stop when the session is cancelled
//! by teardown, and either one starts teardown when its half of the stream
//! fails.

use std::io;

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    select,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::ServerConfig,
    hub::Hub,
    mailbox::MailboxReceiver,
    message::{ServerMessage, read_line, write_line},
    router::{CommandRouter, Flow},
    session::{ConnectionId, SessionHandle},
};

pub(crate) fn spawn<S>(
    hub: Hub,
    config: &ServerConfig,
    session: SessionHandle,
    inbox: MailboxReceiver,
    stream: S,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let cancel = session.cancel_token();
    let id = session.id();

    tokio::spawn(write_loop(
        write_half,
        inbox,
        hub.clone(),
        id,
        cancel.clone(),
        config.farewell_timeout,
    ));

    let router = CommandRouter::new(hub.clone(), session);
    tokio::spawn(read_loop(
        read_half,
        router,
        hub,
        cancel,
        config.max_line_bytes,
    ));
}

async fn read_loop<R>(
    reader: R,
    mut router: CommandRouter,
    hub: Hub,
    cancel: CancellationToken,
    max_line_bytes: usize,
) where
    R: AsyncRead + Unpin,
{
    let id = router.connection_id();
    let mut reader = BufReader::new(reader);

    loop {
        let next = select! {
            biased;
            _ = cancel.cancelled() => break,
            next = read_line(&mut reader, max_line_bytes) => next,
        };

        match next {
            Ok(Some(line)) => {
                debug!(conn = id, %line, "received line");
                match router.handle_line(&line).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Close) => break,
                    Err(err) => {
                        debug!(conn = id, error = %err, "cannot reply to session");
                        break;
                    }
                }
            }
            Ok(None) => {
                debug!(conn = id, "peer closed the connection");
                break;
            }
            Err(err) => {
                debug!(conn = id, error = %err, "session read failed");
                break;
            }
        }
    }

    hub.teardown(id).await;
}

async fn write_loop<W>(
    mut writer: W,
    mut inbox: MailboxReceiver,
    hub: Hub,
    id: ConnectionId,
    cancel: CancellationToken,
    farewell_timeout: std::time::Duration,
) where
    W: AsyncWrite + Unpin,
{
    let unsent = match pump(&mut writer, &mut inbox, &cancel).await {
        Ok(unsent) => unsent,
        Err(err) => {
            debug!(conn = id, error = %err, "session write failed");
            inbox.close();
            hub.teardown(id).await;
            return;
        }
    };

    inbox.close();
    match timeout(farewell_timeout, farewell(&mut writer, &mut inbox, &unsent)).await {
        Ok(Ok(())) => debug!(conn = id, "session closed"),
        Ok(Err(err)) => debug!(conn = id, error = %err, "farewell not delivered"),
        Err(_) => debug!(conn = id, "farewell timed out"),
    }
}

/// Copies mailbox lines to the stream until the session is cancelled or the
/// mailbox has no senders left.
///
/// Cancellation can land in the middle of a line. The bytes not yet written
/// are returned so the farewell finishes that line before anything else.
async fn pump<W>(
    writer: &mut W,
    inbox: &mut MailboxReceiver,
    cancel: &CancellationToken,
) -> io::Result<Vec<u8>>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let next = select! {
            biased;
            _ = cancel.cancelled() => return Ok(Vec::new()),
            next = inbox.recv() => next,
        };
        let Some(line) = next else {
            return Ok(Vec::new());
        };

        let mut pending = line.into_bytes();
        pending.push(b'\n');
        let mut written = 0;
        while written < pending.len() {
            // `write` is cancel safe: a dropped call has written nothing.
            let n = select! {
                biased;
                _ = cancel.cancelled() => None,
                n = writer.write(&pending[written..]) => Some(n?),
            };
            let Some(n) = n else {
                return Ok(pending.split_off(written));
            };
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            written += n;
        }

        select! {
            biased;
            _ = cancel.cancelled() => return Ok(Vec::new()),
            flushed = writer.flush() => flushed?,
        }
    }
}

/// Finishes the interrupted line, flushes whatever was queued before
/// teardown, then writes the closing notice.
async fn farewell<W>(
    writer: &mut W,
    inbox: &mut MailboxReceiver,
    unsent: &[u8],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(unsent).await?;
    while let Some(line) = inbox.try_recv() {
        write_line(writer, &line).await?;
    }
    write_line(writer, &ServerMessage::Farewell.to_string()).await?;
    writer.shutdown().await
}
