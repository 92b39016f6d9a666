use std::io;

use crate::{error::CloseFrame, protocol::Message};

/// `Event`s are produced by a [`Connection`](crate::Connection) and delivered through
/// [`WebSocket::recv`](crate::WebSocket::recv).
#[derive(Debug)]
pub enum Event {
    /// A complete text or binary message.
    Message(Message),
    /// The connection is closed. Emitted exactly once per connection.
    Close(CloseFrame),
    /// The transport failed. A `Close` event always follows.
    Error(io::Error),
}
