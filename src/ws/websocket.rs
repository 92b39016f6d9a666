use std::{marker::PhantomData, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tracing::Instrument;

use super::{Connection, Event, recv_loop::recv_loop};
use crate::{
    config::Config,
    error::CloseReason,
    role::{Client, RolePolicy, Server},
    transport::WriteQueue,
};

pub type WebSocketClient = WebSocket<Client>;

pub type ServerConn = WebSocket<Server>;

pub(super) enum Command {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close(CloseReason, String),
}

/// Handle to a connection driven by a background tokio task.
///
/// Sends are best effort: once the connection is closing they are dropped silently.
/// Dropping the handle starts a normal close handshake if none is in progress.
pub struct WebSocket<R: RolePolicy> {
    cmd_tx: UnboundedSender<Command>,
    event_rx: UnboundedReceiver<Event>,
    protocol: Option<String>,
    extensions: Vec<String>,
    _role: PhantomData<R>,
}

impl<R: RolePolicy> WebSocket<R> {
    /// Takes over a stream whose HTTP upgrade already completed and spawns the task
    /// that drives it. Must be called from within a tokio runtime.
    pub fn from_stream<S>(
        stream: S,
        config: Config,
        extensions: Vec<String>,
        protocol: Option<String>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let conn = Connection::<R, WriteQueue>::new(
            WriteQueue::new(),
            event_tx,
            config,
            extensions.clone(),
            protocol.clone(),
        );
        let span = tracing::info_span!("ws", role = R::NAME, protocol = ?protocol);
        tokio::spawn(recv_loop(conn, stream, cmd_rx).instrument(span));

        Self {
            cmd_tx,
            event_rx,
            protocol,
            extensions,
            _role: PhantomData,
        }
    }

    pub fn send_text(&self, text: impl Into<String>) { self.command(Command::Text(text.into())); }

    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) {
        self.command(Command::Binary(bytes.into()));
    }

    pub fn ping(&self) { self.command(Command::Ping); }

    pub fn pong(&self) { self.command(Command::Pong); }

    pub fn close(&self) { self.close_reason(CloseReason::Normal, ""); }

    pub fn close_reason(&self, reason: CloseReason, text: &str) {
        self.command(Command::Close(reason, text.to_owned()));
    }

    /// Subprotocol negotiated during the upgrade.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> { self.protocol.as_deref() }

    #[must_use]
    pub fn extensions(&self) -> &[String] { &self.extensions }

    /// Waits for the next event. Returns `None` after the [`Event::Close`] has been
    /// received and the driver task finished.
    pub async fn recv(&mut self) -> Option<Event> { self.event_rx.recv().await }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Event> {
        tokio::time::timeout(timeout, self.event_rx.recv())
            .await
            .unwrap_or_default()
    }

    fn command(&self, cmd: Command) {
        // the driver is gone once the connection closed
        let _ = self.cmd_tx.send(cmd);
    }
}
