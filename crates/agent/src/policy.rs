//! The security-policy collaborator: consulted before any resource
//! mutation. Treated as an opaque authorization oracle; no policy engine
//! lives in this crate.

use protocol::resources::{RequestType, ResourceType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny { reason: String },
}

pub trait SecurityPolicy: Send + Sync {
    fn authorize_modify(
        &self,
        resource: &ResourceType,
        op: RequestType,
        settings: &serde_json::Value,
    ) -> PolicyDecision;
}

/// Authorizes every request; stands in for the real policy engine in tests
/// and the default binary wiring.
#[derive(Debug, Default)]
pub struct AllowAllPolicy;

impl SecurityPolicy for AllowAllPolicy {
    fn authorize_modify(&self, _resource: &ResourceType, _op: RequestType, _settings: &serde_json::Value) -> PolicyDecision {
        PolicyDecision::Allow
    }
}
