use super::{Connection, Event, ReadyState};
use crate::{
    error::{CloseFrame, CloseReason},
    frames::{Frame, Opcode},
    protocol::{Message, MessageError, MessageKind, PartialMessage},
    role::RolePolicy,
    transport::Transport,
};

impl<R: RolePolicy, T: Transport> Connection<R, T> {
    pub(super) fn handle_frame(&mut self, frame: Frame) {
        match frame.opcode {
            Opcode::Ping => {
                tracing::debug!("received PING, replying with PONG");
                self.pong();
            }
            Opcode::Pong => tracing::debug!("received PONG"),
            Opcode::Close => self.handle_close(frame.close),
            Opcode::Text | Opcode::Bin | Opcode::Cont => self.handle_message(frame),
        }
    }

    // If we are closing this is the peer's acknowledgement; otherwise echo and hang up
    fn handle_close(&mut self, status: Option<CloseFrame>) {
        if self.state == ReadyState::ClosingLocal {
            tracing::info!("peer acknowledged close");
            self.close_deadline = None;
            self.state = ReadyState::Closed;
            self.transport.end();
            return;
        }

        let status = status.unwrap_or_else(|| CloseFrame::new(CloseReason::NoStatus, ""));
        if status.reason == CloseReason::Normal {
            tracing::info!("received Close frame");
        } else {
            tracing::warn!(
                code = status.code(),
                description = %status.text,
                "remote peer closed connection: {}",
                status.reason
            );
        }
        self.record_close(status);

        self.state = ReadyState::ClosingRemote;
        self.send_close_frame(CloseReason::Normal, "");
        self.connected = false;
        self.transport.end();
    }

    // Build message out of frames
    fn handle_message(&mut self, frame: Frame) {
        tracing::trace!(
            partial = self.partial.is_some(),
            opcode = ?frame.opcode,
            fin = frame.fin,
            "handling message"
        );
        let kind = match frame.opcode {
            Opcode::Text => Some(MessageKind::Text),
            Opcode::Bin => Some(MessageKind::Binary),
            _ => None,
        };

        match (self.partial.take(), kind) {
            (None, Some(kind)) if frame.fin => {
                self.emit_message(Message::from_payload(kind, frame.payload.to_vec()));
            }
            (None, Some(kind)) => {
                tracing::trace!(?kind, "fragmented message started");
                self.partial = Some(PartialMessage::new(kind, frame.payload));
            }
            (Some(_), Some(_)) => {
                // a new TEXT or BINARY may not interrupt a fragmented message
                self.drop_connection(
                    CloseReason::ProtocolError,
                    if frame.opcode == Opcode::Text {
                        "Illegal TEXT frame in the middle of a fragmented message"
                    } else {
                        "Illegal BINARY frame in the middle of a fragmented message"
                    },
                );
            }
            (None, None) => {
                self.drop_connection(
                    CloseReason::ProtocolError,
                    "Continuation frame without a message to continue",
                );
            }
            (Some(mut partial), None) => {
                partial.push(frame.payload);
                tracing::trace!(current_len = partial.len(), "message fragment appended");
                if frame.fin {
                    self.emit_message(partial.into_message());
                } else {
                    self.partial = Some(partial);
                }
            }
        }
    }

    fn emit_message(&mut self, msg: Result<Message, MessageError>) {
        match msg {
            Ok(msg) => {
                tracing::debug!(len = msg.len(), "message assembly complete");
                let _ = self.events.send(Event::Message(msg));
            }
            // if invalid UTF-8 immediately close connection
            Err(MessageError::Utf8) => {
                self.drop_connection(CloseReason::ProtocolError, "Invalid UTF-8 in text message");
            }
        }
    }
}
