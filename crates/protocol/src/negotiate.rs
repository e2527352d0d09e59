//! `NegotiateProtocol` request/response and the capability set the guest
//! advertises back to the host.

use serde::{Deserialize, Serialize};

/// Only `V4` is currently valid.
pub const SUPPORTED_VERSION: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiateProtocolRequest {
    #[serde(rename = "MinimumVersion")]
    pub minimum_version: u32,
    #[serde(rename = "MaximumVersion")]
    pub maximum_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GuestDefinedCapabilities {
    #[serde(rename = "NamespaceAddRequestSupported", default)]
    pub namespace_add_request_supported: bool,
    #[serde(rename = "SignalProcessSupported", default)]
    pub signal_process_supported: bool,
    #[serde(rename = "DumpStacksSupported", default)]
    pub dump_stacks_supported: bool,
    #[serde(rename = "DeleteContainerStateSupported", default)]
    pub delete_container_state_supported: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsCapabilities {
    #[serde(rename = "SendHostCreateMessage")]
    pub send_host_create_message: bool,
    #[serde(rename = "SendHostStartMessage")]
    pub send_host_start_message: bool,
    #[serde(rename = "HvSocketConfigOnStartup")]
    pub hv_socket_config_on_startup: bool,
    #[serde(rename = "SupportedSchemaVersions")]
    pub supported_schema_versions: Vec<u32>,
    #[serde(rename = "RuntimeOsType")]
    pub runtime_os_type: String,
    #[serde(rename = "GuestDefinedCapabilities")]
    pub guest_defined_capabilities: GuestDefinedCapabilities,
}

impl Default for GcsCapabilities {
    fn default() -> Self {
        Self {
            send_host_create_message: true,
            send_host_start_message: true,
            hv_socket_config_on_startup: false,
            supported_schema_versions: vec![SUPPORTED_VERSION],
            runtime_os_type: "linux".into(),
            guest_defined_capabilities: GuestDefinedCapabilities {
                namespace_add_request_supported: false,
                signal_process_supported: true,
                dump_stacks_supported: true,
                delete_container_state_supported: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiateProtocolResponse {
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "Capabilities")]
    pub capabilities: GcsCapabilities,
}

/// Picks the highest version within the overlap `[min(req), max(req)]` that
/// this guest supports, or `None` when the ranges don't overlap at all.
pub fn negotiate_version(req: &NegotiateProtocolRequest) -> Option<u32> {
    if req.minimum_version <= SUPPORTED_VERSION && SUPPORTED_VERSION <= req.maximum_version {
        Some(SUPPORTED_VERSION)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_v4_when_in_range() {
        let req = NegotiateProtocolRequest {
            minimum_version: 4,
            maximum_version: 4,
        };
        assert_eq!(negotiate_version(&req), Some(4));
    }

    #[test]
    fn rejects_non_overlapping_range() {
        let req = NegotiateProtocolRequest {
            minimum_version: 1,
            maximum_version: 3,
        };
        assert_eq!(negotiate_version(&req), None);
    }
}
