use bytes::Bytes;

use super::Opcode;
use crate::error::CloseFrame;

/// A fully decoded frame: header plus the complete, unmasked payload.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) fin: bool,
    pub(crate) rsv1: bool,
    pub(crate) rsv2: bool,
    pub(crate) rsv3: bool,
    pub(crate) opcode: Opcode,
    pub(crate) masked: bool,
    pub(crate) payload_len: u64,
    pub(crate) mask_key: Option<[u8; 4]>,
    pub(crate) payload: Bytes,
    /// Only set for Close frames that carried a status code.
    pub(crate) close: Option<CloseFrame>,
}
