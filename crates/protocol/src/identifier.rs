//! The 32-bit `MessageIdentifier` bit-field: `TTTT CCCCCCCC IIIIIIIIIIII VVVVVVVV`.

use std::fmt;

/// Top nibble of a [`MessageIdentifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    None = 0,
    Request = 1,
    Response = 2,
    Notification = 3,
}

impl MessageType {
    fn from_nibble(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Request),
            2 => Some(Self::Response),
            3 => Some(Self::Notification),
            _ => None,
        }
    }
}

/// Category byte. Only `ComputeSystem` is currently defined.
pub const CATEGORY_COMPUTE_SYSTEM: u8 = 0x01;

/// The protocol message version carried in the identifier (distinct from
/// the negotiated [`crate::negotiate::ProtocolVersion`]).
pub const MESSAGE_VERSION: u8 = 0x01;

/// A packed `MessageIdentifier`: type (4 bits) | category (8 bits) | id (12 bits) | version (8 bits).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageIdentifier(pub u32);

impl MessageIdentifier {
    pub fn new(message_type: MessageType, category: u8, id: u16, version: u8) -> Self {
        debug_assert!(id <= 0x0FFF, "message id must fit in 12 bits");
        let t = (message_type as u32) << 28;
        let c = (category as u32) << 20;
        let i = (id as u32 & 0x0FFF) << 8;
        let v = version as u32;
        Self(t | c | i | v)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn message_type(self) -> Option<MessageType> {
        MessageType::from_nibble(((self.0 >> 28) & 0xF) as u8)
    }

    pub fn category(self) -> u8 {
        ((self.0 >> 20) & 0xFF) as u8
    }

    pub fn id(self) -> u16 {
        ((self.0 >> 8) & 0x0FFF) as u16
    }

    pub fn version(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// `responseOf(req) = (req with T <- Response)`. The lower 28 bits are
    /// left untouched; only the top nibble changes.
    pub fn response_identifier_of(self) -> Self {
        let cleared = self.0 & 0x0FFF_FFFF;
        Self(cleared | ((MessageType::Response as u32) << 28))
    }
}

impl fmt::Debug for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageIdentifier")
            .field("raw", &format_args!("{:#010x}", self.0))
            .field("type", &self.message_type())
            .field("category", &self.category())
            .field("id", &self.id())
            .field("version", &self.version())
            .finish()
    }
}
