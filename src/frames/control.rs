use std::marker::PhantomData;

use bytes::{BufMut, Bytes, BytesMut};

use super::Opcode;
use crate::{error::CloseReason, role::RolePolicy};

const MAX_CONTROL_PAYLOAD: usize = 125;
const MAX_CLOSE_TEXT: usize = MAX_CONTROL_PAYLOAD - 2;

// Separate ControlFrame struct to allow a fast path for sending single frames (Ping, Pong, Close) which will have a payload <= 125 bytes and FIN always set.
pub(crate) struct ControlFrame<'a, R: RolePolicy> {
    opcode: Opcode,
    payload: &'a [u8],
    _p: PhantomData<R>,
}

impl<'a, R: RolePolicy> ControlFrame<'a, R> {
    pub(crate) fn ping(payload: &'a [u8]) -> Self {
        Self {
            opcode: Opcode::Ping,
            payload,
            _p: PhantomData,
        }
    }

    pub(crate) fn pong(payload: &'a [u8]) -> Self {
        Self {
            opcode: Opcode::Pong,
            payload,
            _p: PhantomData,
        }
    }

    pub(crate) fn close(payload: &'a [u8]) -> Self {
        Self {
            opcode: Opcode::Close,
            payload,
            _p: PhantomData,
        }
    }

    /// Close frame whose payload is the big-endian status code followed by `text`,
    /// cut to fit the control frame limit.
    pub(crate) fn close_reason(reason: CloseReason, text: &str) -> Bytes {
        let bytes = &text.as_bytes()[..floor_char_boundary(text, MAX_CLOSE_TEXT)];

        let mut buf = BytesMut::with_capacity(2 + bytes.len());
        buf.put_slice(&<[u8; 2]>::from(reason));
        buf.put_slice(bytes);
        ControlFrame::<R>::close(&buf).encode()
    }

    // encoding: sets Opcode, FIN, MASK and optionally masks payload
    pub(crate) fn encode(self) -> Bytes {
        let payload = &self.payload[..self.payload.len().min(MAX_CONTROL_PAYLOAD)];
        tracing::trace!(
            opcode = ?self.opcode,
            len = payload.len(),
            "{} encoding CTRL",
            R::NAME
        );

        let mut buf = BytesMut::with_capacity(payload.len() + if R::CLIENT { 6 } else { 2 });
        buf.put_u8(self.opcode as u8 | 0x80); // always set FIN
        #[allow(clippy::cast_possible_truncation)]
        buf.put_u8(payload.len() as u8);

        // Clients must SEND masked
        if R::CLIENT {
            buf[1] |= 0x80;
            let mut mask_key = [0; 4];
            rand::fill(&mut mask_key);
            buf.put_slice(&mask_key);

            let start = buf.len();
            buf.put_slice(payload);
            crate::protocol::mask(&mut buf[start..], mask_key);
        } else {
            buf.put_slice(payload);
        }

        buf.freeze()
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{Client, Server};

    #[test]
    fn pong_is_final_and_empty() {
        let frame = ControlFrame::<Server>::pong(&[]).encode();
        assert_eq!(&frame[..], &[0x8A, 0x00]);

        let frame = ControlFrame::<Client>::pong(&[]).encode();
        assert_eq!(frame.len(), 6);
        assert_eq!(&frame[..2], &[0x8A, 0x80]);
    }

    #[test]
    fn close_prepends_status_code() {
        let frame = ControlFrame::<Server>::close_reason(CloseReason::MessageTooLarge, "big");
        assert_eq!(&frame[..], &[0x88, 5, 0x03, 0xEC, b'b', b'i', b'g']);
    }

    #[test]
    fn close_text_is_cut_on_char_boundary() {
        let text = "é".repeat(100);
        let frame = ControlFrame::<Server>::close_reason(CloseReason::Normal, &text);
        let len = frame[1] as usize;
        assert!(len <= MAX_CONTROL_PAYLOAD);
        assert!(std::str::from_utf8(&frame[4..]).is_ok());
        assert_eq!(len, 2 + 122);
    }
}
