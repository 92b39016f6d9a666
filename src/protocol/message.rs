use bytes::Bytes;

/// Assembled messages received from an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Valid UTF-8 message.
    Text(String),
    /// Binary message bytes.
    Binary(Vec<u8>),
}

impl Message {
    pub(crate) fn from_payload(kind: MessageKind, data: Vec<u8>) -> Result<Self, MessageError> {
        match kind {
            MessageKind::Binary => Ok(Message::Binary(data)),
            MessageKind::Text => String::from_utf8(data)
                .map(Message::Text)
                .map_err(|_| MessageError::Utf8),
        }
    }

    /// If the type is `Message::Text`, returns a reference to the internal `String`, otherwise
    /// `None`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Message::Binary(..) => None,
            Message::Text(s) => Some(s),
        }
    }

    /// Returns a reference to the data as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Binary(b) => b,
            Message::Text(s) => s.as_bytes(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Message::Binary(b) => b.len(),
            Message::Text(s) => s.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum MessageKind {
    Text,
    Binary,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MessageError {
    Utf8,
}

/// Fragments of a message that is still being received, in arrival order.
#[derive(Debug)]
pub(crate) struct PartialMessage {
    kind: MessageKind,
    fragments: Vec<Bytes>,
    len: usize,
}

impl PartialMessage {
    pub(crate) fn new(kind: MessageKind, first: Bytes) -> Self {
        Self {
            kind,
            len: first.len(),
            fragments: vec![first],
        }
    }

    pub(crate) fn push(&mut self, fragment: Bytes) {
        self.len += fragment.len();
        self.fragments.push(fragment);
    }

    pub(crate) fn len(&self) -> usize { self.len }

    /// Concatenates every fragment and, for text, validates the result as UTF-8.
    pub(crate) fn into_message(self) -> Result<Message, MessageError> {
        let mut data = Vec::with_capacity(self.len);
        for fragment in &self.fragments {
            data.extend_from_slice(fragment);
        }
        Message::from_payload(self.kind, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_fragments_in_arrival_order() {
        let mut partial = PartialMessage::new(MessageKind::Text, Bytes::from_static(b"He"));
        partial.push(Bytes::from_static(b"ll"));
        partial.push(Bytes::from_static(b"o"));
        assert_eq!(partial.len(), 5);
        assert_eq!(partial.into_message(), Ok(Message::Text("Hello".into())));
    }

    #[test]
    fn invalid_utf8_is_rejected_only_for_text() {
        let bytes = Bytes::from_static(&[0xF0, 0x28, 0x8C, 0x28]);
        let text = PartialMessage::new(MessageKind::Text, bytes.clone());
        assert_eq!(text.into_message(), Err(MessageError::Utf8));

        let binary = PartialMessage::new(MessageKind::Binary, bytes);
        assert_eq!(binary.into_message().map(|m| m.len()), Ok(4));
    }

    #[test]
    fn utf8_split_across_fragments_is_valid() {
        let euro = "€".as_bytes();
        let first = Bytes::copy_from_slice(&euro[..1]);
        let mut partial = PartialMessage::new(MessageKind::Text, first);
        partial.push(Bytes::copy_from_slice(&euro[1..]));
        assert_eq!(partial.into_message().unwrap().as_str(), Some("€"));
    }
}
