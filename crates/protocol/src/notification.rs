//! Guest-originated notifications, pushed to the host asynchronously.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    GracefulExit,
    ForcedExit,
    UnexpectedExit,
    Reboot,
    Constructed,
    Started,
    Paused,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationOperation {
    None,
    Construct,
    Start,
    Pause,
    Resume,
    Shutdown,
    Terminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "ContainerId")]
    pub container_id: String,
    #[serde(rename = "Type")]
    pub notification_type: NotificationType,
    #[serde(rename = "Operation")]
    pub operation: NotificationOperation,
    #[serde(rename = "Result")]
    pub result: i32,
    #[serde(rename = "ResultInfo", skip_serializing_if = "Option::is_none")]
    pub result_info: Option<String>,
}
