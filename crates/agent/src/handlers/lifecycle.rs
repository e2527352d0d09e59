use super::HandlerServices;
use crate::mount::Mounter;
use crate::policy::SecurityPolicy;
use crate::runtime::{ContainerRuntime, OciSpec};
use protocol::error::GcsError;
use protocol::messages::{CreateRequest, ShutdownRequest, StartRequest};
use protocol::notification::{Notification, NotificationOperation, NotificationType};

pub async fn handle_create<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: CreateRequest = serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    services
        .runtime
        .create(&request.base.container_id, &request.oci_bundle_path, &OciSpec(request.oci_specification))
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    services
        .notifications
        .send_notification(&Notification {
            container_id: request.base.container_id.clone(),
            notification_type: NotificationType::Constructed,
            operation: NotificationOperation::Construct,
            result: 0,
            result_info: None,
        })
        .await;

    Ok((activity_id, serde_json::json!({})))
}

pub async fn handle_start<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: StartRequest = serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    services
        .runtime
        .start(&request.base.container_id)
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    services
        .notifications
        .send_notification(&Notification {
            container_id: request.base.container_id.clone(),
            notification_type: NotificationType::Started,
            operation: NotificationOperation::Start,
            result: 0,
            result_info: None,
        })
        .await;

    Ok((activity_id, serde_json::json!({})))
}

pub async fn handle_shutdown<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
    force: bool,
) -> Result<(String, serde_json::Value), GcsError> {
    let request: ShutdownRequest = serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    services
        .runtime
        .shutdown(&request.base.container_id, force)
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    Ok((activity_id, serde_json::json!({})))
}
