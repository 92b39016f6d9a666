/// Frame opcodes, numbered as they appear on the wire.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Opcode {
    Cont = 0x0,
    Text = 0x1,
    Bin = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Close, Ping and Pong.
    #[must_use]
    pub(crate) fn is_control(self) -> bool { self as u8 & 0x8 != 0 }

    #[must_use]
    pub(crate) fn is_data(self) -> bool { !self.is_control() }
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::Cont),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Bin),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            _ => Err(()),
        }
    }
}
