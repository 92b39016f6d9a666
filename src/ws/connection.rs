use std::io;

use bytes::Bytes;
use tokio::{sync::mpsc::UnboundedSender, time::Instant};

use super::Event;
use crate::{
    config::Config,
    error::{CloseFrame, CloseReason},
    frames::{ControlFrame, DataFrame, FrameDecoder, FrameParseError, FrameState, Opcode, Scratch},
    protocol::{ByteBuffer, PartialMessage},
    role::RolePolicy,
    transport::Transport,
};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadyState {
    Open,
    /// We sent a Close frame and are waiting for the peer to echo it.
    ClosingLocal,
    /// The peer sent a Close frame; we echoed it and ended the transport.
    ClosingRemote,
    Closed,
}

/// Protocol state of one upgraded connection.
///
/// The connection never touches a socket itself: inbound bytes are handed to
/// [`handle_data`](Self::handle_data), outbound frames go to its [`Transport`], and
/// whoever owns the socket reports transport events back. Everything runs
/// synchronously on the caller's task.
pub struct Connection<R: RolePolicy, T: Transport> {
    pub(super) transport: T,
    pub(super) events: UnboundedSender<Event>,
    pub(super) config: Config,
    protocol: Option<String>,
    extensions: Vec<String>,
    buffer: ByteBuffer,
    decoder: FrameDecoder<R>,
    scratch: Scratch,
    pub(super) partial: Option<PartialMessage>,
    pub(super) state: ReadyState,
    pub(super) connected: bool,
    pub(super) close_deadline: Option<Instant>,
    close_status: Option<CloseFrame>,
    close_emitted: bool,
}

impl<R: RolePolicy, T: Transport> Connection<R, T> {
    /// Wraps a transport whose HTTP upgrade already completed.
    ///
    /// `extensions` and `protocol` are what the upgrade negotiated. No extension
    /// transforms payloads, but a negotiated extension permits the RSV bits.
    pub fn new(
        transport: T,
        events: UnboundedSender<Event>,
        config: Config,
        extensions: Vec<String>,
        protocol: Option<String>,
    ) -> Self {
        Self {
            transport,
            events,
            decoder: FrameDecoder::new(&config, !extensions.is_empty()),
            config,
            protocol,
            extensions,
            buffer: ByteBuffer::new(),
            scratch: Scratch::default(),
            partial: None,
            state: ReadyState::Open,
            connected: true,
            close_deadline: None,
            close_status: None,
            close_emitted: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ReadyState { self.state }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.connected }

    #[must_use]
    pub fn protocol(&self) -> Option<&str> { self.protocol.as_deref() }

    #[must_use]
    pub fn extensions(&self) -> &[String] { &self.extensions }

    #[must_use]
    pub fn config(&self) -> &Config { &self.config }

    /// When the pending close handshake gives up, if one is pending.
    #[must_use]
    pub fn close_deadline(&self) -> Option<Instant> { self.close_deadline }

    pub fn transport(&self) -> &T { &self.transport }

    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Feeds bytes read from the transport, decoding and dispatching every frame they
    /// complete.
    pub fn handle_data(&mut self, chunk: Bytes) {
        if !self.is_receiving() {
            tracing::trace!(len = chunk.len(), state = ?self.state, "ignoring inbound data");
            return;
        }
        self.buffer.write(chunk);

        while self.is_receiving() {
            let buffered = self.partial.as_ref().map_or(0, PartialMessage::len);
            match self
                .decoder
                .next_frame(&mut self.buffer, &mut self.scratch, buffered)
            {
                Ok(FrameState::Complete(frame)) => self.handle_frame(frame),
                // wait for the next read
                Ok(FrameState::Incomplete) => break,
                Err(FrameParseError::Protocol(text)) => {
                    self.drop_connection(CloseReason::ProtocolError, text);
                }
                Err(FrameParseError::TooLarge(text)) => {
                    self.drop_connection(CloseReason::MessageTooLarge, text);
                }
            }
        }
    }

    /// The peer finished its side of the stream.
    pub fn handle_end(&mut self) {
        tracing::debug!(state = ?self.state, "peer ended stream");
        self.transport.end();
    }

    /// The transport failed. Nothing more is decoded; [`Event::Close`] follows once
    /// the transport reports closed.
    pub fn handle_transport_error(&mut self, err: io::Error) {
        tracing::warn!(error = %err, "transport error");
        self.connected = false;
        self.close_deadline = None;
        self.partial = None;
        self.state = ReadyState::Closed;
        let _ = self.events.send(Event::Error(err));
    }

    /// The transport is fully closed. Emits [`Event::Close`] the first time only.
    pub fn handle_transport_closed(&mut self) {
        self.connected = false;
        self.close_deadline = None;
        self.partial = None;
        self.state = ReadyState::Closed;
        if !self.buffer.is_empty() {
            tracing::trace!(len = self.buffer.len(), "discarding unread bytes");
            self.buffer.consume(self.buffer.len());
        }

        if self.close_emitted {
            return;
        }
        self.close_emitted = true;

        let status = self
            .close_status
            .clone()
            .unwrap_or_else(|| CloseFrame::new(CloseReason::Abnormal, ""));
        tracing::info!(code = status.code(), reason = %status.text, "connection closed");
        let _ = self.events.send(Event::Close(status));
    }

    /// The close deadline passed without the peer echoing our Close frame.
    pub fn handle_close_timer(&mut self) {
        if self.state != ReadyState::ClosingLocal || self.close_deadline.take().is_none() {
            return;
        }
        tracing::info!("close handshake timed out, terminating transport");
        self.state = ReadyState::Closed;
        self.transport.end();
    }

    /// Starts a normal close handshake.
    pub fn close(&mut self) { self.close_with(CloseReason::Normal, ""); }

    /// Starts a close handshake with `reason`; the transport is ended when the peer
    /// echoes the Close frame or after [`Config::close_timeout`].
    pub fn close_with(&mut self, reason: CloseReason, text: &str) {
        if self.state != ReadyState::Open || !self.connected {
            return;
        }
        tracing::info!(code = reason.code(), text, "{} sending close", R::NAME);
        // a timeout too large to represent never fires
        self.close_deadline = Instant::now().checked_add(self.config.close_timeout);
        self.send_close_frame(reason, text);
        self.record_close(CloseFrame::new(reason, text));
        self.connected = false;
        self.state = ReadyState::ClosingLocal;
    }

    pub fn send_text(&mut self, text: &str) { self.send_data(text.as_bytes(), Opcode::Text); }

    pub fn send_binary(&mut self, bytes: &[u8]) { self.send_data(bytes, Opcode::Bin); }

    pub fn ping(&mut self) {
        if self.can_send() {
            self.transport.write(ControlFrame::<R>::ping(&[]).encode());
        }
    }

    pub fn pong(&mut self) {
        if self.can_send() {
            self.transport.write(ControlFrame::<R>::pong(&[]).encode());
        }
    }

    /// Sends a Close frame with `reason` and ends the transport without waiting for
    /// the peer.
    pub(super) fn drop_connection(&mut self, reason: CloseReason, text: &str) {
        tracing::warn!(code = reason.code(), reason = text, "dropping connection");
        self.send_close_frame(reason, text);
        self.record_close(CloseFrame::new(reason, text));
        self.connected = false;
        self.close_deadline = None;
        self.partial = None;
        self.state = ReadyState::Closed;
        self.transport.end();
    }

    pub(super) fn send_close_frame(&mut self, reason: CloseReason, text: &str) {
        if self.connected && self.transport.is_writable() {
            self.transport
                .write(ControlFrame::<R>::close_reason(reason, text));
        }
    }

    pub(super) fn record_close(&mut self, status: CloseFrame) {
        if self.close_status.is_none() {
            self.close_status = Some(status);
        }
    }

    fn send_data(&mut self, payload: &[u8], opcode: Opcode) {
        if !self.can_send() {
            tracing::trace!(len = payload.len(), state = ?self.state, "send on closing connection dropped");
            return;
        }
        for frame in DataFrame::<R>::new(payload, opcode).encode(self.config.max_frame_size) {
            self.transport.write(frame);
        }
    }

    fn can_send(&self) -> bool {
        self.state == ReadyState::Open && self.connected && self.transport.is_writable()
    }

    fn is_receiving(&self) -> bool {
        matches!(self.state, ReadyState::Open | ReadyState::ClosingLocal)
    }
}
