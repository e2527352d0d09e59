use super::HandlerServices;
use crate::mount::{MountConfig, Mounter};
use crate::policy::{PolicyDecision, SecurityPolicy};
use crate::runtime::ContainerRuntime;
use protocol::error::GcsError;
use protocol::resources::{decode_settings, parse_envelope, ResourceError, ResourceSettings};

/// Decodes, authorizes, then dispatches a `ModifySettings` request. SCSI
/// mutations go to the mount manager; every other resource type is
/// authorized but otherwise out of scope (no device attach beyond SCSI is
/// implemented here).
///
/// Decoding happens in two stages (see [`decode_settings`]): an
/// unrecognised `ResourceType` fails here with
/// [`GcsError::InvalidResourceType`], while a recognised type whose
/// `Settings` shape doesn't match fails with [`GcsError::InvalidPayload`] —
/// the settings shape is a malformed request, not an unknown resource.
pub async fn handle_modify_settings<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let envelope = parse_envelope(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = envelope.base.activity_id.clone();
    let request_type = envelope.request.request_type;

    let settings = decode_settings(&envelope.request.resource_type, &envelope.request.settings).map_err(|e| match e {
        ResourceError::InvalidResourceType(t) => GcsError::InvalidResourceType(t),
        ResourceError::InvalidSettings { .. } | ResourceError::InvalidEnvelope(_) => GcsError::InvalidPayload(e.to_string()),
    })?;
    let resource_type = settings.resource_type();

    match services.policy.authorize_modify(&resource_type, request_type, &envelope.request.settings) {
        PolicyDecision::Allow => {}
        PolicyDecision::Deny { reason } => return Err(GcsError::SecurityPolicyDeny { reason }),
    }

    let body = match settings {
        ResourceSettings::ScsiDevice(scsi) => {
            let config = MountConfig::new(
                scsi.partition,
                scsi.read_only,
                scsi.encrypted,
                scsi.block_device,
                scsi.options,
                scsi.ensure_filesystem,
                scsi.filesystem,
            );
            let assigned_path = services
                .mounts
                .mount(&services.cancel, scsi.controller, scsi.lun, &scsi.mount_path, config)
                .await
                .map_err(Into::<GcsError>::into)?;
            serde_json::json!({ "MountPath": assigned_path })
        }
        _ => serde_json::json!({}),
    };

    Ok((activity_id, body))
}
