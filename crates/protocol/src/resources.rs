//! `ModifySettings` polymorphic payload: a two-phase decode keyed on
//! `ResourceType`, exactly as described in spec §4.2.

use crate::envelope::MessageBase;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("unrecognised resource type: {0:?}")]
    InvalidResourceType(String),
    #[error("failed to decode settings for {resource_type:?}: {source}")]
    InvalidSettings {
        resource_type: ResourceType,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),
}

/// `{Add,Remove,Update}`. Defaults to `Add` when absent from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RequestType {
    #[default]
    Add,
    Remove,
    Update,
}

/// The resource class a `ModifySettings` message is mutating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "SCSIDevice")]
    ScsiDevice,
    MappedVirtualDisk,
    MappedDirectory,
    VPMemDevice,
    CombinedLayers,
    NetworkAdapter,
    VPCIDevice,
    ContainerConstraints,
    SecurityPolicy,
    PolicyFragment,
}

/// Stage 1: the outer envelope with `Request.Settings` left unparsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifySettingsEnvelope {
    #[serde(flatten)]
    pub base: MessageBase,
    #[serde(rename = "Request")]
    pub request: RawResourceModificationRequest,
}

/// The `{ResourceType, RequestType, Settings}` triple with `ResourceType`
/// and `Settings` both left unclassified: an unrecognised `ResourceType`
/// string must not fail this stage (spec §4.2/§7) — it's only classified in
/// [`decode_settings`], stage 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResourceModificationRequest {
    #[serde(rename = "ResourceType")]
    pub resource_type: String,
    #[serde(rename = "RequestType", default)]
    pub request_type: RequestType,
    #[serde(rename = "Settings")]
    pub settings: serde_json::Value,
}

macro_rules! settings_struct {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$fmeta:meta])* $field:ident : $ty:ty => $wire:literal ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $( $(#[$fmeta])* #[serde(rename = $wire)] pub $field : $ty, )*
        }
    };
}

settings_struct! {
    /// Settings for `ResourceType::ScsiDevice`: also the basis for
    /// `agent::mount::MountConfig`.
    ScsiDeviceSettings {
        controller: u8 => "Controller",
        lun: u8 => "Lun",
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partition: Option<u32> => "Partition",
        #[serde(default)]
        read_only: bool => "ReadOnly",
        #[serde(default)]
        encrypted: bool => "Encrypted",
        #[serde(default)]
        block_device: bool => "BlockDevice",
        #[serde(default)]
        options: Vec<String> => "Options",
        #[serde(default)]
        ensure_filesystem: bool => "EnsureFilesystem",
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filesystem: Option<String> => "Filesystem",
        #[serde(default, skip_serializing_if = "String::is_empty")]
        mount_path: String => "MountPath",
    }
}

settings_struct! {
    MappedVirtualDiskSettings {
        controller: u8 => "Controller",
        lun: u8 => "Lun",
        #[serde(rename = "ContainerPath")]
        container_path: String => "ContainerPath",
        #[serde(default)]
        read_only: bool => "ReadOnly",
        #[serde(default)]
        options: Vec<String> => "Options",
    }
}

settings_struct! {
    MappedDirectorySettings {
        port: u32 => "Port",
        container_path: String => "ContainerPath",
        #[serde(default)]
        read_only: bool => "ReadOnly",
    }
}

settings_struct! {
    VpMemDeviceSettings {
        device_number: u32 => "DeviceNumber",
        container_path: String => "ContainerPath",
        #[serde(default)]
        read_only: bool => "ReadOnly",
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mapped_pages: Option<Vec<u64>> => "MappedPages",
    }
}

settings_struct! {
    CombinedLayersSettings {
        container_root_path: String => "ContainerRootPath",
        #[serde(default)]
        layers: Vec<String> => "Layers",
    }
}

settings_struct! {
    NetworkAdapterSettings {
        #[serde(rename = "ID")]
        id: String => "ID",
        #[serde(rename = "AdapterInstanceId")]
        adapter_instance_id: String => "AdapterInstanceId",
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mac_address: Option<String> => "MacAddress",
        #[serde(default, skip_serializing_if = "Option::is_none")]
        allocated_ip_address: Option<String> => "AllocatedIpAddress",
    }
}

settings_struct! {
    VpciDeviceSettings {
        #[serde(rename = "VMBusInstanceId")]
        vm_bus_instance_id: String => "VMBusInstanceId",
    }
}

settings_struct! {
    ContainerConstraintsSettings {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cpu_limit: Option<u32> => "CpuLimit",
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memory_limit_in_mb: Option<u64> => "MemoryLimitInMB",
    }
}

settings_struct! {
    SecurityPolicySettings {
        policy: String => "Policy",
    }
}

settings_struct! {
    PolicyFragmentSettings {
        fragment: String => "Fragment",
    }
}

/// Stage 2 result: `Settings` decoded into the concrete record matching
/// `ResourceType`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSettings {
    ScsiDevice(ScsiDeviceSettings),
    MappedVirtualDisk(MappedVirtualDiskSettings),
    MappedDirectory(MappedDirectorySettings),
    VPMemDevice(VpMemDeviceSettings),
    CombinedLayers(CombinedLayersSettings),
    NetworkAdapter(NetworkAdapterSettings),
    VPCIDevice(VpciDeviceSettings),
    ContainerConstraints(ContainerConstraintsSettings),
    SecurityPolicy(SecurityPolicySettings),
    PolicyFragment(PolicyFragmentSettings),
}

impl ResourceSettings {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceSettings::ScsiDevice(_) => ResourceType::ScsiDevice,
            ResourceSettings::MappedVirtualDisk(_) => ResourceType::MappedVirtualDisk,
            ResourceSettings::MappedDirectory(_) => ResourceType::MappedDirectory,
            ResourceSettings::VPMemDevice(_) => ResourceType::VPMemDevice,
            ResourceSettings::CombinedLayers(_) => ResourceType::CombinedLayers,
            ResourceSettings::NetworkAdapter(_) => ResourceType::NetworkAdapter,
            ResourceSettings::VPCIDevice(_) => ResourceType::VPCIDevice,
            ResourceSettings::ContainerConstraints(_) => ResourceType::ContainerConstraints,
            ResourceSettings::SecurityPolicy(_) => ResourceType::SecurityPolicy,
            ResourceSettings::PolicyFragment(_) => ResourceType::PolicyFragment,
        }
    }
}

/// Parses stage 1 of a `ModifySettings` payload. Succeeds even when
/// `ResourceType` names something this bridge doesn't recognise — that's a
/// stage-2 concern (`decode_settings`).
pub fn parse_envelope(payload: &[u8]) -> Result<ModifySettingsEnvelope, ResourceError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Classifies the wire `ResourceType` discriminator. Returns
/// [`ResourceError::InvalidResourceType`] for a discriminator this bridge
/// doesn't recognise at all, as distinct from one it recognises whose
/// `Settings` shape fails to decode.
fn classify_resource_type(raw: &str) -> Result<ResourceType, ResourceError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| ResourceError::InvalidResourceType(raw.to_string()))
}

/// Stage 2: classifies `resource_type_raw`, then decodes `raw_settings` into
/// the matching concrete record. An unrecognised discriminator fails with
/// [`ResourceError::InvalidResourceType`]; a recognised one whose `Settings`
/// doesn't match its expected shape fails with
/// [`ResourceError::InvalidSettings`].
pub fn decode_settings(resource_type_raw: &str, raw_settings: &serde_json::Value) -> Result<ResourceSettings, ResourceError> {
    let resource_type = classify_resource_type(resource_type_raw)?;

    macro_rules! decode {
        ($variant:ident, $ty:ty) => {
            serde_json::from_value::<$ty>(raw_settings.clone())
                .map(ResourceSettings::$variant)
                .map_err(|source| ResourceError::InvalidSettings {
                    resource_type,
                    source,
                })
        };
    }

    match resource_type {
        ResourceType::ScsiDevice => decode!(ScsiDevice, ScsiDeviceSettings),
        ResourceType::MappedVirtualDisk => decode!(MappedVirtualDisk, MappedVirtualDiskSettings),
        ResourceType::MappedDirectory => decode!(MappedDirectory, MappedDirectorySettings),
        ResourceType::VPMemDevice => decode!(VPMemDevice, VpMemDeviceSettings),
        ResourceType::CombinedLayers => decode!(CombinedLayers, CombinedLayersSettings),
        ResourceType::NetworkAdapter => decode!(NetworkAdapter, NetworkAdapterSettings),
        ResourceType::VPCIDevice => decode!(VPCIDevice, VpciDeviceSettings),
        ResourceType::ContainerConstraints => decode!(ContainerConstraints, ContainerConstraintsSettings),
        ResourceType::SecurityPolicy => decode!(SecurityPolicy, SecurityPolicySettings),
        ResourceType::PolicyFragment => decode!(PolicyFragment, PolicyFragmentSettings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_type_defaults_to_add_when_absent() {
        let payload = br#"{
            "ContainerId":"c1","ActivityId":"a1",
            "Request":{"ResourceType":"MappedVirtualDisk","Settings":{
                "Controller":0,"Lun":1,"ContainerPath":"/mnt/disk"
            }}
        }"#;
        let envelope = parse_envelope(payload).unwrap();
        assert_eq!(envelope.request.request_type, RequestType::Add);
        assert_eq!(envelope.request.resource_type, "MappedVirtualDisk");

        let decoded = decode_settings(&envelope.request.resource_type, &envelope.request.settings).unwrap();
        assert_eq!(decoded.resource_type(), ResourceType::MappedVirtualDisk);
        match decoded {
            ResourceSettings::MappedVirtualDisk(s) => {
                assert_eq!(s.controller, 0);
                assert_eq!(s.lun, 1);
                assert_eq!(s.container_path, "/mnt/disk");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_resource_type_parses_the_envelope_but_fails_stage_two() {
        let payload = br#"{
            "ContainerId":"c1","ActivityId":"a1",
            "Request":{"ResourceType":"QuantumFoamDevice","Settings":{}}
        }"#;
        let envelope = parse_envelope(payload).unwrap();
        assert_eq!(envelope.request.resource_type, "QuantumFoamDevice");

        let err = decode_settings(&envelope.request.resource_type, &envelope.request.settings).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidResourceType(_)));
    }

    #[test]
    fn recognised_resource_type_with_bad_settings_shape_is_not_invalid_resource_type() {
        let payload = br#"{
            "ContainerId":"c1","ActivityId":"a1",
            "Request":{"ResourceType":"SCSIDevice","Settings":{"Controller":"not-a-number"}}
        }"#;
        let envelope = parse_envelope(payload).unwrap();
        let err = decode_settings(&envelope.request.resource_type, &envelope.request.settings).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidSettings { resource_type: ResourceType::ScsiDevice, .. }));
    }

    macro_rules! round_trip_test {
        ($test_name:ident, $resource_type:expr, $variant:ident, $value:expr) => {
            #[test]
            fn $test_name() {
                let settings = $value;
                let raw = serde_json::to_value(&settings).unwrap();
                let decoded = decode_settings($resource_type, &raw).unwrap();
                assert_eq!(decoded, ResourceSettings::$variant(settings));
            }
        };
    }

    round_trip_test!(
        round_trips_scsi_device,
        "SCSIDevice",
        ScsiDevice,
        ScsiDeviceSettings {
            controller: 0,
            lun: 3,
            partition: None,
            read_only: true,
            encrypted: false,
            block_device: false,
            options: vec!["noatime".into(), "ro".into()],
            ensure_filesystem: false,
            filesystem: Some("ext4".into()),
            mount_path: String::new(),
        }
    );
    round_trip_test!(
        round_trips_mapped_virtual_disk,
        "MappedVirtualDisk",
        MappedVirtualDisk,
        MappedVirtualDiskSettings {
            controller: 0,
            lun: 1,
            container_path: "/mnt/disk".into(),
            read_only: false,
            options: vec![],
        }
    );
    round_trip_test!(
        round_trips_mapped_directory,
        "MappedDirectory",
        MappedDirectory,
        MappedDirectorySettings {
            port: 4,
            container_path: "/mnt/share".into(),
            read_only: true,
        }
    );
    round_trip_test!(
        round_trips_vpmem_device,
        "VPMemDevice",
        VPMemDevice,
        VpMemDeviceSettings {
            device_number: 2,
            container_path: "/mnt/layer0".into(),
            read_only: true,
            mapped_pages: None,
        }
    );
    round_trip_test!(
        round_trips_combined_layers,
        "CombinedLayers",
        CombinedLayers,
        CombinedLayersSettings {
            container_root_path: "/run/rootfs".into(),
            layers: vec!["/layer0".into(), "/layer1".into()],
        }
    );
    round_trip_test!(
        round_trips_network_adapter,
        "NetworkAdapter",
        NetworkAdapter,
        NetworkAdapterSettings {
            id: "nic0".into(),
            adapter_instance_id: "instance-0".into(),
            mac_address: Some("00:11:22:33:44:55".into()),
            allocated_ip_address: Some("10.0.0.2".into()),
        }
    );
    round_trip_test!(
        round_trips_vpci_device,
        "VPCIDevice",
        VPCIDevice,
        VpciDeviceSettings {
            vm_bus_instance_id: "{00000000-0000-0000-0000-000000000000}".into(),
        }
    );
    round_trip_test!(
        round_trips_container_constraints,
        "ContainerConstraints",
        ContainerConstraints,
        ContainerConstraintsSettings {
            cpu_limit: Some(2),
            memory_limit_in_mb: Some(512),
        }
    );
    round_trip_test!(
        round_trips_security_policy,
        "SecurityPolicy",
        SecurityPolicy,
        SecurityPolicySettings {
            policy: "base64-encoded-rego".into(),
        }
    );
    round_trip_test!(
        round_trips_policy_fragment,
        "PolicyFragment",
        PolicyFragment,
        PolicyFragmentSettings {
            fragment: "fragment-body".into(),
        }
    );
}
