use std::collections::VecDeque;

use bytes::{Buf, Bytes};

/// Append-only, consume-from-front queue of received socket chunks.
///
/// Chunks are kept as they arrived; nothing is copied on `write`. The head chunk may
/// be partially consumed, in which case it is advanced in place.
#[derive(Debug, Default)]
pub(crate) struct ByteBuffer {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl ByteBuffer {
    pub(crate) fn new() -> Self { Self::default() }

    pub(crate) fn write(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    pub(crate) fn len(&self) -> usize { self.len }

    pub(crate) fn is_empty(&self) -> bool { self.len == 0 }

    /// Returns the next `count` bytes without consuming them, or `None` if fewer are
    /// buffered. Borrows from the head chunk when the range sits inside it, otherwise
    /// copies into the front of `scratch`, which must hold at least `count` bytes.
    pub(crate) fn peek<'a>(&'a self, count: usize, scratch: &'a mut [u8]) -> Option<&'a [u8]> {
        if count > self.len {
            return None;
        }
        match self.chunks.front() {
            Some(head) if head.len() >= count => Some(&head[..count]),
            _ => {
                let dst = &mut scratch[..count];
                self.copy_front(dst);
                Some(dst)
            }
        }
    }

    /// Fills `dst` with the next `dst.len()` bytes without consuming them.
    /// Returns `false` if not enough bytes are buffered yet.
    pub(crate) fn peek_into(&self, dst: &mut [u8]) -> bool {
        if dst.len() > self.len {
            return false;
        }
        self.copy_front(dst);
        true
    }

    /// Discards up to `count` bytes from the front.
    pub(crate) fn consume(&mut self, count: usize) { self.consume_with(count, |_| {}); }

    /// Discards up to `count` bytes from the front, handing each contiguous piece to
    /// `f` first. Exhausted chunks are released.
    pub(crate) fn consume_with(&mut self, count: usize, mut f: impl FnMut(&[u8])) {
        let mut remaining = count.min(self.len);
        self.len -= remaining;

        while remaining > 0 {
            let Some(head) = self.chunks.front_mut() else {
                break;
            };
            if head.len() <= remaining {
                remaining -= head.len();
                f(head);
                self.chunks.pop_front();
            } else {
                f(&head[..remaining]);
                head.advance(remaining);
                remaining = 0;
            }
        }
    }

    fn copy_front(&self, dst: &mut [u8]) {
        let mut filled = 0;
        for chunk in &self.chunks {
            if filled == dst.len() {
                break;
            }
            let n = chunk.len().min(dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&chunk[..n]);
            filled += n;
        }
    }
}
