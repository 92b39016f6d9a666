use std::marker::PhantomData;

use bytes::BytesMut;

use super::{Frame, Opcode};
use crate::{
    config::Config,
    error::{CloseFrame, CloseReason},
    protocol::{ByteBuffer, apply_mask},
    role::RolePolicy,
};

// helper type since decoder errors return FrameParseError
type Result<T> = std::result::Result<T, FrameParseError>;

#[derive(Debug)]
pub(crate) enum FrameState {
    Complete(Frame),
    Incomplete,
}

/// Why a frame was rejected. The text ends up as the reason of the Close frame sent
/// to the peer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FrameParseError {
    Protocol(&'static str),
    TooLarge(&'static str),
}

/// Connection-owned scratch space the decoder borrows for every frame. Header and
/// length bytes only land here when they straddle two chunks.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    header: [u8; 2],
    ext_len: [u8; 8],
    mask_key: [u8; 4],
}

pub(crate) struct FrameDecoder<R: RolePolicy> {
    state: DecodeState,
    ctx: DecodeContext,
    max_frame_size: usize,
    max_message_size: usize,
    allow_rsv: bool,
    _p: PhantomData<R>,
}

#[derive(Debug, Copy, Clone)]
enum DecodeState {
    Header,
    ExtendedLen,
    Mask,
    Payload,
}

#[derive(Debug)]
struct DecodeContext {
    fin: bool,
    rsv: [bool; 3],
    opcode: Opcode,
    masked: bool,
    len7: u8,
    payload_len: u64,
    len: usize,
}

impl DecodeContext {
    fn new() -> Self {
        Self {
            fin: false,
            rsv: [false; 3],
            opcode: Opcode::Cont,
            masked: false,
            len7: 0,
            payload_len: 0,
            len: 0,
        }
    }
}

impl<R: RolePolicy> FrameDecoder<R> {
    /// `allow_rsv` is set when an extension was negotiated during the upgrade.
    pub(crate) fn new(config: &Config, allow_rsv: bool) -> Self {
        Self {
            state: DecodeState::Header,
            ctx: DecodeContext::new(),
            max_frame_size: config.max_frame_size,
            max_message_size: config.max_message_size,
            allow_rsv,
            _p: PhantomData,
        }
    }

    /// Decodes the next frame from `buf`.
    ///
    /// `buffered` is the size of the fragmented message currently being reassembled,
    /// so continuation frames can be checked against the message limit before their
    /// payload is read. Returns `Incomplete` whenever a stage needs bytes that have
    /// not arrived yet; progress made so far is kept for the next call.
    pub(crate) fn next_frame(
        &mut self,
        buf: &mut ByteBuffer,
        scratch: &mut Scratch,
        buffered: usize,
    ) -> Result<FrameState> {
        loop {
            let next_state = match self.state {
                DecodeState::Header => {
                    let Some(&[b0, b1]) = buf.peek(2, &mut scratch.header) else {
                        return Ok(FrameState::Incomplete);
                    };
                    buf.consume(2);
                    self.parse_header(b0, b1, buffered)?
                }
                DecodeState::ExtendedLen => {
                    let n = if self.ctx.len7 == 126 { 2 } else { 8 };
                    let Some(len_bytes) = buf.peek(n, &mut scratch.ext_len) else {
                        return Ok(FrameState::Incomplete);
                    };
                    let len = parse_extended_len(len_bytes)?;
                    buf.consume(n);
                    self.check_size(len, buffered)?
                }
                DecodeState::Mask => {
                    if !buf.peek_into(&mut scratch.mask_key) {
                        return Ok(FrameState::Incomplete);
                    }
                    buf.consume(4);
                    DecodeState::Payload
                }
                DecodeState::Payload => {
                    if buf.len() < self.ctx.len {
                        return Ok(FrameState::Incomplete);
                    }
                    let frame = self.take_frame(buf, scratch)?;
                    self.state = DecodeState::Header;

                    tracing::trace!(
                        opcode = ?frame.opcode,
                        fin = frame.fin,
                        payload_len = frame.payload_len,
                        masked = frame.masked,
                        mask_key = ?frame.mask_key,
                        rsv = ?(frame.rsv1, frame.rsv2, frame.rsv3),
                        "frame decoded"
                    );
                    return Ok(FrameState::Complete(frame));
                }
            };
            tracing::trace!(from = ?self.state, to = ?next_state, "state transition");
            self.state = next_state;
        }
    }

    fn parse_header(&mut self, b0: u8, b1: u8, buffered: usize) -> Result<DecodeState> {
        // 0   | 1 2 3 | 4 5 6 7
        // Fin | Rsv   | Opcode
        let rsv = [b0 & 0x40 != 0, b0 & 0x20 != 0, b0 & 0x10 != 0];
        if rsv.contains(&true) && !self.allow_rsv {
            tracing::warn!(?rsv, "invalid RSV bits");
            return Err(FrameParseError::Protocol(
                "Reserved bits set without a negotiated extension",
            ));
        }

        let fin = b0 & 0x80 != 0;
        let opcode = Opcode::try_from(b0 & 0x0F).map_err(|()| {
            tracing::trace!(opcode = b0 & 0x0F, "invalid opcode");
            FrameParseError::Protocol("Unrecognized opcode")
        })?;

        // 0    | 1 2 3 4 5 6 7
        // Mask | Payload len
        let masked = b1 & 0x80 != 0;
        // Servers must only receive masked frames, clients only unmasked ones
        if masked != R::SERVER {
            tracing::trace!(masked, "frame mask violates policy");
            return Err(FrameParseError::Protocol(if R::SERVER {
                "Received unmasked frame from client"
            } else {
                "Received masked frame from server"
            }));
        }

        let len7 = b1 & 0x7F;
        // control frames must be FIN and carry at most 125B
        if opcode.is_control() && (!fin || len7 > 125) {
            tracing::trace!("invalid control frame received");
            return Err(FrameParseError::Protocol(
                "Control frames must not be fragmented or exceed 125 bytes",
            ));
        }

        self.ctx = DecodeContext {
            fin,
            rsv,
            opcode,
            masked,
            len7,
            payload_len: 0,
            len: 0,
        };

        match len7 {
            126 | 127 => Ok(DecodeState::ExtendedLen),
            n => self.check_size(u64::from(n), buffered),
        }
    }

    // Runs before anything of the payload is read
    fn check_size(&mut self, payload_len: u64, buffered: usize) -> Result<DecodeState> {
        self.ctx.payload_len = payload_len;
        let len = match usize::try_from(payload_len) {
            Ok(len) if len <= self.max_frame_size => len,
            _ => {
                tracing::trace!(payload_len, max = self.max_frame_size, "frame too large");
                return Err(FrameParseError::TooLarge("Frame exceeded maximum size"));
            }
        };

        let prior = if self.ctx.opcode == Opcode::Cont { buffered } else { 0 };
        if self.ctx.opcode.is_data() && prior.saturating_add(len) > self.max_message_size {
            tracing::trace!(prior, len, max = self.max_message_size, "message too large");
            return Err(FrameParseError::TooLarge("Message exceeded maximum size"));
        }

        self.ctx.len = len;
        Ok(if self.ctx.masked {
            DecodeState::Mask
        } else {
            DecodeState::Payload
        })
    }

    fn take_frame(&mut self, buf: &mut ByteBuffer, scratch: &Scratch) -> Result<Frame> {
        let mask_key = self.ctx.masked.then_some(scratch.mask_key);

        // copy out chunk by chunk, unmasking each piece where the last one stopped
        let mut payload = BytesMut::with_capacity(self.ctx.len);
        let mut key_idx = 0;
        buf.consume_with(self.ctx.len, |piece| {
            let start = payload.len();
            payload.extend_from_slice(piece);
            if let Some(key) = mask_key {
                key_idx = apply_mask(&mut payload[start..], key, key_idx);
            }
        });
        let payload = payload.freeze();

        let close = if self.ctx.opcode == Opcode::Close {
            parse_close_payload(&payload)?
        } else {
            None
        };

        let [rsv1, rsv2, rsv3] = self.ctx.rsv;
        Ok(Frame {
            fin: self.ctx.fin,
            rsv1,
            rsv2,
            rsv3,
            opcode: self.ctx.opcode,
            masked: self.ctx.masked,
            payload_len: self.ctx.payload_len,
            mask_key,
            payload,
            close,
        })
    }
}

fn parse_extended_len(bytes: &[u8]) -> Result<u64> {
    if let [hi, lo] = *bytes {
        // 126 => 2 bytes extended (u16)
        return Ok(u64::from(u16::from_be_bytes([hi, lo])));
    }
    // 127 => 8 bytes extended (u64), most significant bit must be 0
    let mut len_bytes = [0; 8];
    len_bytes.copy_from_slice(bytes);
    let len = u64::from_be_bytes(len_bytes);
    if len >> 63 != 0 {
        tracing::trace!(len, "64-bit length has its most significant bit set");
        return Err(FrameParseError::Protocol("Invalid 64-bit payload length"));
    }
    Ok(len)
}

// Any status code is accepted; deciding what it means is up to the connection
fn parse_close_payload(bytes: &[u8]) -> Result<Option<CloseFrame>> {
    match bytes {
        [] => Ok(None),
        [_] => Err(FrameParseError::Protocol("Close frame with a truncated status code")),
        [hi, lo, text @ ..] => {
            let code = u16::from_be_bytes([*hi, *lo]);
            let text = std::str::from_utf8(text)
                .map_err(|_| FrameParseError::Protocol("Invalid UTF-8 in close reason"))?;
            Ok(Some(CloseFrame::new(CloseReason::from(code), text)))
        }
    }
}
