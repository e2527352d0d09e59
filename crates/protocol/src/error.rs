//! The wire-level error model: a numeric `Result`, an `ActivityId`, and an
//! ordered list of `ErrorRecord`s (spec §4.5 / §7).

use serde::{Deserialize, Serialize};

/// `Result = 0` means success.
pub const RESULT_SUCCESS: i32 = 0;

/// One entry in the error chain bubbled up through nested calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "Result")]
    pub result: i32,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "StackTrace", skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(rename = "ModuleName", skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(rename = "FileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "Line", skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(rename = "FunctionName", skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

/// The envelope every response carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponseBase {
    #[serde(rename = "Result")]
    pub result: i32,
    #[serde(rename = "ActivityId")]
    pub activity_id: String,
    #[serde(rename = "ErrorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "ErrorRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub error_records: Vec<ErrorRecord>,
}

impl MessageResponseBase {
    pub fn success(activity_id: impl Into<String>) -> Self {
        Self {
            result: RESULT_SUCCESS,
            activity_id: activity_id.into(),
            error_message: None,
            error_records: Vec::new(),
        }
    }

    /// Builds a failure envelope from an ordered chain of records; the first
    /// nonzero `Result` wins the envelope-level `Result` field.
    pub fn failure(activity_id: impl Into<String>, records: Vec<ErrorRecord>) -> Self {
        let result = records
            .iter()
            .map(|r| r.result)
            .find(|&r| r != RESULT_SUCCESS)
            .unwrap_or(RESULT_SUCCESS);
        let error_message = records.first().map(|r| r.message.clone());
        Self {
            result,
            activity_id: activity_id.into(),
            error_message,
            error_records: records,
        }
    }
}

/// Recovered and fatal error kinds the bridge can produce (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum GcsError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] crate::framing::FramingError),
    #[error("unknown message identifier {id:#010x}")]
    InvalidMessageType { id: u32 },
    #[error("failed to decode payload: {0}")]
    InvalidPayload(String),
    #[error("message not valid in current connection state: {0}")]
    ProtocolViolation(String),
    #[error("unrecognised resource type: {0}")]
    InvalidResourceType(String),
    #[error("security policy denied the request: {reason}")]
    SecurityPolicyDeny { reason: String },
    #[error("mount path {path:?} is already in use by a different mount")]
    MountPathConflict { path: String },
    #[error("mount failed: {0}")]
    MountFailed(String),
    #[error("unmount failed: {0}")]
    UnmountFailed(String),
    #[error("container runtime operation failed: {0}")]
    RuntimeFailed(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation timed out")]
    Timeout,
    #[error("no overlapping protocol version")]
    ProtocolNotSupported,
}

impl GcsError {
    /// Whether this error is fatal to the connection (closes it) or
    /// recovered and reported back to the host in-band.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GcsError::Transport(_) | GcsError::Framing(_) | GcsError::ProtocolViolation(_))
    }

    /// A stable numeric code suitable for transmission as `Result`.
    ///
    /// These are small sentinel codes rather than real Win32 HRESULTs;
    /// see DESIGN.md for the open-question resolution.
    pub fn result_code(&self) -> i32 {
        match self {
            GcsError::Transport(_) => 0x8000_0001u32 as i32,
            GcsError::Framing(_) => 0x8000_0002u32 as i32,
            GcsError::InvalidMessageType { .. } => 0x8000_0003u32 as i32,
            GcsError::InvalidPayload(_) => 0x8000_0004u32 as i32,
            GcsError::ProtocolViolation(_) => 0x8000_0005u32 as i32,
            GcsError::InvalidResourceType(_) => 0x8000_0006u32 as i32,
            GcsError::SecurityPolicyDeny { .. } => 0x8000_0007u32 as i32,
            GcsError::MountPathConflict { .. } => 0x8000_0008u32 as i32,
            GcsError::MountFailed(_) => 0x8000_0009u32 as i32,
            GcsError::UnmountFailed(_) => 0x8000_000Au32 as i32,
            GcsError::RuntimeFailed(_) => 0x8000_000Bu32 as i32,
            GcsError::Cancelled => 0x8000_000Cu32 as i32,
            GcsError::Timeout => 0x8000_000Du32 as i32,
            GcsError::ProtocolNotSupported => 0x8000_000Eu32 as i32,
        }
    }

    /// Renders this error into a single [`ErrorRecord`], tagged with the
    /// activity id of the request that produced it.
    pub fn to_error_record(&self) -> ErrorRecord {
        ErrorRecord {
            result: self.result_code(),
            message: self.to_string(),
            stack_trace: None,
            module_name: Some("gcs-agent".into()),
            file_name: None,
            line: None,
            function_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_takes_the_first_nonzero_result() {
        let records = vec![
            ErrorRecord {
                result: GcsError::MountFailed("x".into()).result_code(),
                message: "mount failed".into(),
                stack_trace: None,
                module_name: None,
                file_name: None,
                line: None,
                function_name: None,
            },
            ErrorRecord {
                result: 0x8000_000Au32 as i32,
                message: "unmount failed".into(),
                stack_trace: None,
                module_name: None,
                file_name: None,
                line: None,
                function_name: None,
            },
        ];
        let envelope = MessageResponseBase::failure("a1", records);
        assert_eq!(envelope.result, GcsError::MountFailed("x".into()).result_code());
        assert_eq!(envelope.activity_id, "a1");
    }

    #[test]
    fn success_envelope_has_zero_result_and_no_records() {
        let envelope = MessageResponseBase::success("a1");
        assert_eq!(envelope.result, RESULT_SUCCESS);
        assert!(envelope.error_records.is_empty());
    }
}
