//! Request/response payload shapes for the non-`ModifySettings` operations
//! the registry enumerates (spec §4.2/§6). `ModifySettings` lives in
//! [`crate::resources`] since its payload needs the two-phase decode.

use crate::envelope::MessageBase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(flatten)]
    pub base: MessageBase,
    #[serde(rename = "OciBundlePath")]
    pub oci_bundle_path: String,
    #[serde(rename = "OciSpecification")]
    pub oci_specification: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(flatten)]
    pub base: MessageBase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownRequest {
    #[serde(flatten)]
    pub base: MessageBase,
}

/// `CreateInUtilityVM` is carried under the field name `IsExternal` on the
/// wire (spec §6's external-process alias).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessParametersWire {
    #[serde(rename = "CommandLine", default, skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
    #[serde(rename = "Args", default)]
    pub args: Vec<String>,
    #[serde(rename = "WorkingDirectory", default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(rename = "Environment", default)]
    pub environment: std::collections::HashMap<String, String>,
    #[serde(rename = "CreateStdInPipe", default)]
    pub create_std_in_pipe: bool,
    #[serde(rename = "CreateStdOutPipe", default)]
    pub create_std_out_pipe: bool,
    #[serde(rename = "CreateStdErrPipe", default)]
    pub create_std_err_pipe: bool,
    #[serde(rename = "IsExternal", default)]
    pub is_external: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteProcessRequest {
    #[serde(flatten)]
    pub base: MessageBase,
    #[serde(rename = "Settings")]
    pub settings: ProcessParametersWire,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteProcessResponse {
    #[serde(rename = "ProcessId")]
    pub process_id: u32,
}

/// Sentinel meaning "no timeout" (spec §8 S6).
pub const NO_TIMEOUT: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitForProcessRequest {
    #[serde(flatten)]
    pub base: MessageBase,
    #[serde(rename = "ProcessId")]
    pub process_id: u32,
    #[serde(rename = "TimeoutInMs", default = "default_timeout")]
    pub timeout_in_ms: u32,
}

fn default_timeout() -> u32 {
    NO_TIMEOUT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitForProcessResponse {
    #[serde(rename = "ExitCode")]
    pub exit_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalProcessRequest {
    #[serde(flatten)]
    pub base: MessageBase,
    #[serde(rename = "ProcessId")]
    pub process_id: u32,
    #[serde(rename = "Options")]
    pub signal: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeConsoleRequest {
    #[serde(flatten)]
    pub base: MessageBase,
    #[serde(rename = "ProcessId")]
    pub process_id: u32,
    #[serde(rename = "Height")]
    pub height: u16,
    #[serde(rename = "Width")]
    pub width: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPropertiesRequest {
    #[serde(flatten)]
    pub base: MessageBase,
    #[serde(rename = "Queries", default)]
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPropertiesResponse {
    #[serde(rename = "Properties")]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpStacksRequest {
    #[serde(flatten)]
    pub base: MessageBase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpStacksResponse {
    #[serde(rename = "GuestStacks")]
    pub guest_stacks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteContainerStateRequest {
    #[serde(flatten)]
    pub base: MessageBase,
}
