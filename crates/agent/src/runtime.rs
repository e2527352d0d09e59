//! The container runtime collaborator: the bridge dispatches container
//! lifecycle and process operations to this trait. No real OCI runtime is
//! implemented here; `NullRuntime` is a test double only.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type ContainerId = String;
pub type ProcessId = u32;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container {0:?} not found")]
    ContainerNotFound(ContainerId),
    #[error("process {0} not found")]
    ProcessNotFound(ProcessId),
    #[error("container {0:?} already exists")]
    AlreadyExists(ContainerId),
    #[error("operation timed out")]
    Timeout,
    #[error("runtime operation failed: {0}")]
    Failed(String),
}

/// Opaque pass-through for the OCI runtime spec payload; no parsing beyond
/// holding the JSON value is in scope.
#[derive(Debug, Clone)]
pub struct OciSpec(pub serde_json::Value);

#[derive(Debug, Clone, Default)]
pub struct ProcessParameters {
    pub command_line: Option<String>,
    pub args: Vec<String>,
    pub working_directory: Option<String>,
    pub environment: HashMap<String, String>,
    pub create_std_in_pipe: bool,
    pub create_std_out_pipe: bool,
    pub create_std_err_pipe: bool,
    pub is_external: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub exit_code: i32,
}

/// The narrow seam the dispatcher calls into for container lifecycle and
/// process management; an actual OCI-compliant runtime lives outside this
/// crate's scope.
pub trait ContainerRuntime: Send + Sync {
    fn create(
        &self,
        id: &ContainerId,
        bundle_path: &str,
        spec: &OciSpec,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    fn start(&self, id: &ContainerId) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    fn shutdown(
        &self,
        id: &ContainerId,
        force: bool,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    fn exec(
        &self,
        id: &ContainerId,
        params: &ProcessParameters,
    ) -> impl std::future::Future<Output = Result<ProcessId, RuntimeError>> + Send;

    fn wait(
        &self,
        id: &ContainerId,
        pid: ProcessId,
        timeout_ms: Option<u32>,
    ) -> impl std::future::Future<Output = Result<ExitStatus, RuntimeError>> + Send;

    fn signal(
        &self,
        id: &ContainerId,
        pid: ProcessId,
        signal: i32,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    fn resize_console(
        &self,
        id: &ContainerId,
        pid: ProcessId,
        height: u16,
        width: u16,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    fn properties(
        &self,
        id: &ContainerId,
        queries: &[String],
    ) -> impl std::future::Future<Output = Result<serde_json::Value, RuntimeError>> + Send;

    fn delete_state(&self, id: &ContainerId) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;
}

#[derive(Debug, Clone)]
struct ContainerState {
    next_pid: ProcessId,
    processes: HashMap<ProcessId, ExitStatus>,
}

/// In-memory stand-in used only by tests and the default binary wiring; it
/// tracks just enough state to make the dispatcher's contract observable.
#[derive(Default)]
pub struct NullRuntime {
    containers: Mutex<HashMap<ContainerId, ContainerState>>,
}

impl NullRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl ContainerRuntime for NullRuntime {
    async fn create(&self, id: &ContainerId, _bundle_path: &str, _spec: &OciSpec) -> Result<(), RuntimeError> {
        let mut containers = self.containers.lock().await;
        if containers.contains_key(id) {
            return Err(RuntimeError::AlreadyExists(id.clone()));
        }
        containers.insert(
            id.clone(),
            ContainerState {
                next_pid: 1,
                processes: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn start(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        let containers = self.containers.lock().await;
        containers
            .get(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))
    }

    async fn shutdown(&self, id: &ContainerId, _force: bool) -> Result<(), RuntimeError> {
        let mut containers = self.containers.lock().await;
        containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))
    }

    async fn exec(&self, id: &ContainerId, _params: &ProcessParameters) -> Result<ProcessId, RuntimeError> {
        let mut containers = self.containers.lock().await;
        let state = containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))?;
        let pid = state.next_pid;
        state.next_pid += 1;
        state.processes.insert(pid, ExitStatus { exit_code: 0 });
        Ok(pid)
    }

    async fn wait(&self, id: &ContainerId, pid: ProcessId, _timeout_ms: Option<u32>) -> Result<ExitStatus, RuntimeError> {
        let containers = self.containers.lock().await;
        let state = containers
            .get(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))?;
        state.processes.get(&pid).copied().ok_or(RuntimeError::ProcessNotFound(pid))
    }

    async fn signal(&self, id: &ContainerId, pid: ProcessId, _signal: i32) -> Result<(), RuntimeError> {
        let containers = self.containers.lock().await;
        let state = containers
            .get(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))?;
        if state.processes.contains_key(&pid) {
            Ok(())
        } else {
            Err(RuntimeError::ProcessNotFound(pid))
        }
    }

    async fn resize_console(&self, id: &ContainerId, pid: ProcessId, _height: u16, _width: u16) -> Result<(), RuntimeError> {
        let containers = self.containers.lock().await;
        let state = containers
            .get(id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))?;
        if state.processes.contains_key(&pid) {
            Ok(())
        } else {
            Err(RuntimeError::ProcessNotFound(pid))
        }
    }

    async fn properties(&self, id: &ContainerId, _queries: &[String]) -> Result<serde_json::Value, RuntimeError> {
        let containers = self.containers.lock().await;
        containers
            .get(id)
            .map(|_| serde_json::json!({}))
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))
    }

    async fn delete_state(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        let mut containers = self.containers.lock().await;
        containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_start_exec_wait_round_trips() {
        let runtime = NullRuntime::new();
        let id = "c1".to_string();
        runtime.create(&id, "/bundle", &OciSpec(serde_json::json!({}))).await.unwrap();
        runtime.start(&id).await.unwrap();
        let pid = runtime.exec(&id, &ProcessParameters::default()).await.unwrap();
        let status = runtime.wait(&id, pid, None).await.unwrap();
        assert_eq!(status.exit_code, 0);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let runtime = NullRuntime::new();
        let id = "c1".to_string();
        runtime.create(&id, "/bundle", &OciSpec(serde_json::json!({}))).await.unwrap();
        let err = runtime.create(&id, "/bundle", &OciSpec(serde_json::json!({}))).await.unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn operations_on_unknown_container_fail() {
        let runtime = NullRuntime::new();
        let err = runtime.start(&"missing".to_string()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ContainerNotFound(_)));
    }
}
