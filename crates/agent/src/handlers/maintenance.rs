use super::HandlerServices;
use crate::mount::Mounter;
use crate::policy::SecurityPolicy;
use crate::runtime::ContainerRuntime;
use protocol::error::GcsError;
use protocol::messages::{
    DeleteContainerStateRequest, DumpStacksRequest, DumpStacksResponse, GetPropertiesRequest, GetPropertiesResponse,
};

pub async fn handle_get_properties<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: GetPropertiesRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    let properties = services
        .runtime
        .properties(&request.base.container_id, &request.queries)
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    let response = GetPropertiesResponse { properties };
    Ok((activity_id, serde_json::to_value(response).expect("always serialisable")))
}

pub async fn handle_dump_stacks<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    _services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: DumpStacksRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    // No real stack-walking support is in scope; an empty dump is a valid
    // (if uninformative) answer.
    let response = DumpStacksResponse { guest_stacks: String::new() };
    Ok((activity_id, serde_json::to_value(response).expect("always serialisable")))
}

pub async fn handle_delete_container_state<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: DeleteContainerStateRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    services
        .runtime
        .delete_state(&request.base.container_id)
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    Ok((activity_id, serde_json::json!({})))
}
