mod buffer;
mod mask;
mod message;

pub(crate) use buffer::ByteBuffer;
pub(crate) use mask::{apply_mask, mask};
pub use message::Message;
pub(crate) use message::{MessageError, MessageKind, PartialMessage};
