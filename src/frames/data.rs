use std::marker::PhantomData;

use bytes::{BufMut, Bytes, BytesMut};

use super::Opcode;
use crate::role::RolePolicy;

// -- SLOW PATH --
// DataFrames may be fragmented or very large hence they need extra processing compared to
// ControlFrames
pub(crate) struct DataFrame<'a, R: RolePolicy> {
    opcode: Opcode,
    payload: &'a [u8],
    _p: PhantomData<R>,
}

impl<'a, R: RolePolicy> DataFrame<'a, R> {
    pub(crate) fn new(payload: &'a [u8], opcode: Opcode) -> Self {
        Self {
            opcode,
            payload,
            _p: PhantomData,
        }
    }

    /// Encodes the payload as one frame, or as a start frame plus continuations when it
    /// is larger than `fragment_size`.
    pub(crate) fn encode(self, fragment_size: usize) -> Vec<Bytes> {
        let fragment_size = fragment_size.max(1);
        let count = self.payload.len().div_ceil(fragment_size).max(1);
        let mut frames = Vec::with_capacity(count);

        for (i, chunk) in self.payload.chunks(fragment_size).enumerate() {
            let opcode = if i == 0 { self.opcode } else { Opcode::Cont };
            frames.push(encode_frame::<R>(opcode, i + 1 == count, chunk));
        }
        if frames.is_empty() {
            frames.push(encode_frame::<R>(self.opcode, true, &[]));
        }

        tracing::debug!(
            opcode = ?self.opcode,
            len = self.payload.len(),
            frames = frames.len(),
            "{} encoded DATA",
            R::NAME
        );
        frames
    }
}

// Sets FIN, OPCODE, minimal LEN and, for clients, MASK + masked payload.
pub(crate) fn encode_frame<R: RolePolicy>(opcode: Opcode, fin: bool, payload: &[u8]) -> Bytes {
    tracing::trace!(opcode = ?opcode, fin, len = payload.len(), "{} encoding frame", R::NAME);

    let len_bytes = match payload.len() {
        0..=125 => 0,
        126..=65535 => 2,
        _ => 8,
    };
    let mask_bytes = if R::CLIENT { 4 } else { 0 };
    let mut buf = BytesMut::with_capacity(2 + len_bytes + mask_bytes + payload.len());

    buf.put_u8(if fin { 0x80 } else { 0 } | opcode as u8);

    // Clients must SEND masked
    let mask_bit = if R::CLIENT { 0x80 } else { 0 };
    #[allow(clippy::cast_possible_truncation)]
    match payload.len() {
        0..=125 => buf.put_u8(mask_bit | payload.len() as u8),
        126..=65535 => {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(payload.len() as u16);
        }
        _ => {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(payload.len() as u64);
        }
    }

    if R::CLIENT {
        let mut mask_key = [0u8; 4];
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{Client, Server};

    #[test]
    fn server_frames_are_unmasked_and_minimal() {
        let frame = encode_frame::<Server>(Opcode::Text, true, b"hi");
        assert_eq!(&frame[..], &[0x81, 0x02, b'h', b'i']);

        let frame = encode_frame::<Server>(Opcode::Bin, true, &[0; 126]);
        assert_eq!(&frame[..4], &[0x82, 126, 0x00, 126]);
        assert_eq!(frame.len(), 4 + 126);

        let frame = encode_frame::<Server>(Opcode::Bin, false, &[0; 65536]);
        assert_eq!(&frame[..2], &[0x02, 127]);
        assert_eq!(&frame[2..10], &65536u64.to_be_bytes());
        assert_eq!(frame.len(), 10 + 65536);
    }

    #[test]
    fn client_frames_are_masked() {
        let frame = encode_frame::<Client>(Opcode::Text, true, b"Hello");
        assert_eq!(frame[0], 0x81);
        assert_eq!(frame[1], 0x80 | 5);
        assert_eq!(frame.len(), 2 + 4 + 5);

        let key = [frame[2], frame[3], frame[4], frame[5]];
        let mut payload = frame[6..].to_vec();
        crate::protocol::mask(&mut payload, key);
        assert_eq!(payload, b"Hello");
    }

    #[test]
    fn fragments_large_payloads() {
        let payload = vec![7u8; 10];
        let frames = DataFrame::<Server>::new(&payload, Opcode::Bin).encode(4);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0][0], 0x02);
        assert_eq!(frames[1][0], 0x00);
        assert_eq!(frames[2][0], 0x80);
        assert_eq!(frames[2][1], 2);
    }

    #[test]
    fn empty_payload_is_one_frame() {
        let frames = DataFrame::<Server>::new(&[], Opcode::Text).encode(16);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0x81, 0x00]);
    }
}
