use std::fmt;

/// Close status codes carried in the first two bytes of a Close frame.
///
/// `NoStatus` and `Abnormal` are only ever reported locally and never sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Normal close
    Normal,
    /// Endpoint is going away
    GoingAway,
    /// Websocket protocol violation
    ProtocolError,
    /// Endpoint could not process the input it received
    UnprocessableInput,
    /// A frame or reassembled message exceeded the configured limits
    MessageTooLarge,
    /// The peer closed without a status code
    NoStatus,
    /// The transport closed without a close handshake
    Abnormal,
    /// Any other code
    Other(u16),
}

impl CloseReason {
    #[must_use]
    pub fn code(self) -> u16 { self.into() }
}

impl From<CloseReason> for u16 {
    fn from(value: CloseReason) -> Self {
        match value {
            CloseReason::Normal => 1000,
            CloseReason::GoingAway => 1001,
            CloseReason::ProtocolError => 1002,
            CloseReason::UnprocessableInput => 1003,
            CloseReason::MessageTooLarge => 1004,
            CloseReason::NoStatus => 1005,
            CloseReason::Abnormal => 1006,
            CloseReason::Other(code) => code,
        }
    }
}

impl From<u16> for CloseReason {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseReason::Normal,
            1001 => CloseReason::GoingAway,
            1002 => CloseReason::ProtocolError,
            1003 => CloseReason::UnprocessableInput,
            1004 => CloseReason::MessageTooLarge,
            1005 => CloseReason::NoStatus,
            1006 => CloseReason::Abnormal,
            _ => CloseReason::Other(code),
        }
    }
}

/// Converts a reason code to bytes of the appropriate endianness.
impl From<CloseReason> for [u8; 2] {
    fn from(value: CloseReason) -> Self { u16::from(value).to_be_bytes() }
}

impl From<[u8; 2]> for CloseReason {
    fn from(bytes: [u8; 2]) -> Self { u16::from_be_bytes(bytes).into() }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Normal => f.write_str("Normal"),
            CloseReason::GoingAway => f.write_str("Going Away"),
            CloseReason::ProtocolError => f.write_str("Protocol Error"),
            CloseReason::UnprocessableInput => f.write_str("Unprocessable Input"),
            CloseReason::MessageTooLarge => f.write_str("Message Too Large"),
            CloseReason::NoStatus => f.write_str("No Status"),
            CloseReason::Abnormal => f.write_str("Abnormal Closure"),
            CloseReason::Other(code) => write!(f, "Status code {code}"),
        }
    }
}

/// Close status of a connection: the code plus optional UTF-8 reason text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub reason: CloseReason,
    pub text: String,
}

impl CloseFrame {
    pub(crate) fn new(reason: CloseReason, text: impl Into<String>) -> Self {
        Self {
            reason,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> u16 { self.reason.code() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_both_ways() {
        for code in 1000..=1006 {
            assert_eq!(CloseReason::from(code).code(), code);
        }
        assert_eq!(CloseReason::from(4000), CloseReason::Other(4000));
        assert_eq!(CloseReason::from(1004), CloseReason::MessageTooLarge);
    }

    #[test]
    fn encodes_big_endian() {
        let bytes: [u8; 2] = CloseReason::ProtocolError.into();
        assert_eq!(bytes, [0x03, 0xEA]);
        assert_eq!(CloseReason::from([0x03, 0xE8]), CloseReason::Normal);
    }
}
