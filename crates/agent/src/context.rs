//! Connection-scoped negotiated state. Replaces the "global process-wide
//! protocol version" pattern flagged in the design notes: each connection
//! owns its own context rather than writing through a process global.

use protocol::negotiate::GcsCapabilities;

#[derive(Debug, Clone)]
pub struct NegotiatedContext {
    pub version: u32,
    pub capabilities: GcsCapabilities,
}

impl NegotiatedContext {
    pub fn new(version: u32, capabilities: GcsCapabilities) -> Self {
        Self { version, capabilities }
    }
}
