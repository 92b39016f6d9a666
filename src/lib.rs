#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::empty_docs,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::missing_safety_doc
)]

//! RFC 6455 framing for connections whose HTTP upgrade was handled elsewhere.
//!
//! [`Connection`] is the synchronous protocol core: it decodes frames from whatever
//! chunks the socket delivers, reassembles fragmented messages, enforces size limits
//! and runs the close handshake. [`WebSocket`] drives one on a tokio task for any
//! `AsyncRead + AsyncWrite` stream.

use std::time::Duration;

mod config;
mod error;
mod frames;
mod protocol;
mod role;
mod transport;
mod ws;

pub use config::Config;
pub use error::{CloseFrame, CloseReason};
pub use protocol::Message;
pub use role::{Client, RolePolicy, Server};
pub use transport::{Transport, WriteQueue};
pub use ws::{Connection, Event, ReadyState, ServerConn, WebSocket, WebSocketClient};

pub(crate) const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(5000);
pub(crate) const MAX_FRAME_PAYLOAD: usize = 0xFFFF;
pub(crate) const MAX_MESSAGE_SIZE: usize = 0x10_0000;
