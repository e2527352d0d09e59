//! Enumerates the request identifiers the bridge understands, and maps each
//! to a response identifier via [`MessageIdentifier::response_identifier_of`].

use crate::identifier::{MessageIdentifier, MessageType, CATEGORY_COMPUTE_SYSTEM, MESSAGE_VERSION};

/// The request-side message id, ranged `0x01..=0x0D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestId {
    Create,
    Start,
    ShutdownGraceful,
    ShutdownForced,
    ExecuteProcess,
    WaitForProcess,
    SignalProcess,
    ResizeConsole,
    GetProperties,
    ModifySettings,
    NegotiateProtocol,
    DumpStacks,
    DeleteContainerState,
}

impl RequestId {
    /// All recognised request identifiers, in wire-id order.
    pub const ALL: [RequestId; 13] = [
        RequestId::Create,
        RequestId::Start,
        RequestId::ShutdownGraceful,
        RequestId::ShutdownForced,
        RequestId::ExecuteProcess,
        RequestId::WaitForProcess,
        RequestId::SignalProcess,
        RequestId::ResizeConsole,
        RequestId::GetProperties,
        RequestId::ModifySettings,
        RequestId::NegotiateProtocol,
        RequestId::DumpStacks,
        RequestId::DeleteContainerState,
    ];

    pub const fn wire_id(self) -> u16 {
        match self {
            RequestId::Create => 0x01,
            RequestId::Start => 0x02,
            RequestId::ShutdownGraceful => 0x03,
            RequestId::ShutdownForced => 0x04,
            RequestId::ExecuteProcess => 0x05,
            RequestId::WaitForProcess => 0x06,
            RequestId::SignalProcess => 0x07,
            RequestId::ResizeConsole => 0x08,
            RequestId::GetProperties => 0x09,
            RequestId::ModifySettings => 0x0A,
            RequestId::NegotiateProtocol => 0x0B,
            RequestId::DumpStacks => 0x0C,
            RequestId::DeleteContainerState => 0x0D,
        }
    }

    pub fn from_wire_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.wire_id() == id)
    }

    /// The fully-formed request [`MessageIdentifier`] for this message.
    pub fn identifier(self) -> MessageIdentifier {
        MessageIdentifier::new(
            MessageType::Request,
            CATEGORY_COMPUTE_SYSTEM,
            self.wire_id(),
            MESSAGE_VERSION,
        )
    }

    /// Resolves a raw wire identifier back to a known `RequestId`, provided
    /// its type/category/version match what this bridge expects.
    pub fn from_identifier(identifier: MessageIdentifier) -> Option<Self> {
        if identifier.message_type() != Some(MessageType::Request) {
            return None;
        }
        if identifier.category() != CATEGORY_COMPUTE_SYSTEM {
            return None;
        }
        Self::from_wire_id(identifier.id())
    }
}

/// The notification identifier is fixed: type=Notification, category=ComputeSystem, id=0x001.
pub fn notification_identifier() -> MessageIdentifier {
    MessageIdentifier::new(MessageType::Notification, CATEGORY_COMPUTE_SYSTEM, 0x001, MESSAGE_VERSION)
}
