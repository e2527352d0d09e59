//! Wire protocol for the HCS<->GCS bridge: framing, message identifiers,
//! the request registry, and the polymorphic `ModifySettings` payload.

pub mod envelope;
pub mod error;
pub mod framing;
pub mod identifier;
pub mod messages;
pub mod negotiate;
pub mod notification;
pub mod registry;
pub mod resources;

pub use envelope::{MessageBase, TracingSpanContext};
pub use error::{ErrorRecord, GcsError, MessageResponseBase, RESULT_SUCCESS};
pub use framing::{read_frame, write_frame, FramingError, MessageHeader, HEADER_SIZE};
pub use identifier::{MessageIdentifier, MessageType, CATEGORY_COMPUTE_SYSTEM, MESSAGE_VERSION};
pub use registry::{notification_identifier, RequestId};
