//! Process-wide configuration, generalized from the teacher's hardcoded
//! `constants.rs` into overridable defaults (the vsock port and frame
//! ceiling are legitimately deployment-specific).

use std::env;

/// Default vsock port the guest listens on for the HCS bridge.
pub const DEFAULT_VSOCK_PORT: u32 = 0x40_00;

/// Default ceiling on a single frame's total size (including the header).
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Format template for an auto-assigned SCSI mount path; `{}` is replaced
/// with the entry's stable index.
pub const DEFAULT_MOUNT_PATH_TEMPLATE: &str = "/run/gcs/scsi/{}";

#[derive(Debug, Clone)]
pub struct Config {
    pub vsock_port: u32,
    pub max_frame_bytes: u32,
    pub mount_path_template: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vsock_port: DEFAULT_VSOCK_PORT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            mount_path_template: DEFAULT_MOUNT_PATH_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Reads overrides from the environment, falling back to documented
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            vsock_port: env_u32("GCS_VSOCK_PORT").unwrap_or(defaults.vsock_port),
            max_frame_bytes: env_u32("GCS_MAX_FRAME_BYTES").unwrap_or(defaults.max_frame_bytes),
            mount_path_template: env::var("GCS_MOUNT_PATH_TEMPLATE")
                .unwrap_or(defaults.mount_path_template),
        }
    }

    /// Renders the mount path for a given stable slot index.
    pub fn mount_path_for(&self, index: usize) -> String {
        self.mount_path_template.replace("{}", &index.to_string())
    }
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_mount_path_from_template() {
        let config = Config::default();
        assert_eq!(config.mount_path_for(0), "/run/gcs/scsi/0");
        assert_eq!(config.mount_path_for(12), "/run/gcs/scsi/12");
    }
}
