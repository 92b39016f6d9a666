use std::collections::VecDeque;

use bytes::Bytes;

/// The byte stream a [`Connection`](crate::Connection) writes to.
///
/// Writes are fire-and-forget; failures surface later through
/// [`Connection::handle_transport_error`](crate::Connection::handle_transport_error).
pub trait Transport {
    fn write(&mut self, bytes: Bytes);

    fn is_writable(&self) -> bool;

    /// Requests shutdown of our side of the stream once queued writes are flushed.
    fn end(&mut self);
}

/// Outbound frame queue drained by whoever owns the actual socket.
#[derive(Debug, Default)]
pub struct WriteQueue {
    pending: VecDeque<Bytes>,
    ended: bool,
}

impl WriteQueue {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Takes the next frame to put on the wire.
    pub fn pop(&mut self) -> Option<Bytes> { self.pending.pop_front() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.pending.is_empty() }

    #[must_use]
    pub fn is_ended(&self) -> bool { self.ended }
}

impl Transport for WriteQueue {
    fn write(&mut self, bytes: Bytes) {
        if self.ended {
            tracing::trace!(len = bytes.len(), "write after end discarded");
            return;
        }
        self.pending.push_back(bytes);
    }

    fn is_writable(&self) -> bool { !self.ended }

    fn end(&mut self) { self.ended = true; }
}
