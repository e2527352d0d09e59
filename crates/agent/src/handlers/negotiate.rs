use super::HandlerServices;
use crate::context::NegotiatedContext;
use crate::mount::Mounter;
use crate::policy::SecurityPolicy;
use crate::runtime::ContainerRuntime;
use protocol::error::GcsError;
use protocol::negotiate::{negotiate_version, GcsCapabilities, NegotiateProtocolRequest, NegotiateProtocolResponse};

pub async fn handle_negotiate_protocol<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<serde_json::Value, GcsError> {
    let request: NegotiateProtocolRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;

    let version = negotiate_version(&request).ok_or(GcsError::ProtocolNotSupported)?;
    let capabilities = GcsCapabilities::default();

    *services.negotiated.lock().await = Some(NegotiatedContext::new(version, capabilities.clone()));

    let response = NegotiateProtocolResponse { version, capabilities };
    Ok(serde_json::to_value(response).expect("NegotiateProtocolResponse always serialises"))
}
