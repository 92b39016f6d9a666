use std::io;

use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc::UnboundedReceiver,
    time::{Instant, sleep_until},
};

use super::{Connection, websocket::Command};
use crate::{role::RolePolicy, transport::WriteQueue};

const READ_CHUNK: usize = 8 * 1024;

// Owns the stream for the lifetime of the connection. Every socket read, handle
// command and close-timer expiry is applied to the connection in order, then
// whatever it queued is written out.
pub(super) async fn recv_loop<R, S>(
    mut conn: Connection<R, WriteQueue>,
    stream: S,
    mut cmd_rx: UnboundedReceiver<Command>,
) where
    R: RolePolicy,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut handle_alive = true;

    loop {
        let deadline = conn.close_deadline();
        buf.reserve(READ_CHUNK);

        tokio::select! {
            res = reader.read_buf(&mut buf) => match res {
                Ok(0) => {
                    tracing::info!("TCP FIN");
                    conn.handle_end();
                }
                Ok(n) => {
                    tracing::trace!(bytes = n, "read socket");
                    conn.handle_data(buf.split().freeze());
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "reader error");
                    conn.handle_transport_error(e);
                    break;
                }
            },
            cmd = cmd_rx.recv(), if handle_alive => match cmd {
                Some(cmd) => apply(&mut conn, cmd),
                None => {
                    // best-effort close if the handle was dropped
                    handle_alive = false;
                    conn.close();
                }
            },
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                conn.handle_close_timer();
            }
        }

        if let Err(e) = flush(&mut writer, conn.transport_mut()).await {
            tracing::warn!(error = ?e, "writer error");
            conn.handle_transport_error(e);
            break;
        }
        if conn.transport().is_ended() {
            tracing::debug!("shutting down transport");
            let _ = writer.shutdown().await;
            break;
        }
    }

    conn.handle_transport_closed();
}

fn apply<R: RolePolicy>(conn: &mut Connection<R, WriteQueue>, cmd: Command) {
    match cmd {
        Command::Text(text) => conn.send_text(&text),
        Command::Binary(bytes) => conn.send_binary(&bytes),
        Command::Ping => conn.ping(),
        Command::Pong => conn.pong(),
        Command::Close(reason, text) => conn.close_with(reason, &text),
    }
}

async fn flush<W: AsyncWrite + Unpin>(writer: &mut W, queue: &mut WriteQueue) -> io::Result<()> {
    if queue.is_empty() {
        return Ok(());
    }
    while let Some(bytes) = queue.pop() {
        writer.write_all(&bytes).await?;
    }
    writer.flush().await
}
