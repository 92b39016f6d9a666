mod control;
mod data;
mod decode;
mod frame;
mod opcode;

pub(crate) use control::ControlFrame;
pub(crate) use data::{DataFrame, encode_frame};
pub(crate) use decode::{FrameDecoder, FrameParseError, FrameState, Scratch};
pub(crate) use frame::Frame;
pub(crate) use opcode::Opcode;
