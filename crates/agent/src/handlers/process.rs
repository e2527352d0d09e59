use super::HandlerServices;
use crate::mount::Mounter;
use crate::policy::SecurityPolicy;
use crate::runtime::ContainerRuntime;
use protocol::error::GcsError;
use protocol::messages::{
    ExecuteProcessRequest, ExecuteProcessResponse, ResizeConsoleRequest, SignalProcessRequest, WaitForProcessRequest,
    WaitForProcessResponse, NO_TIMEOUT,
};
use crate::runtime::{ExitStatus, RuntimeError};
use std::time::Duration;

/// Applies `timeout_in_ms` to `future`, treating the `NO_TIMEOUT` sentinel
/// as an unbounded wait.
async fn timed_wait<F>(future: F, timeout_in_ms: u32) -> Result<ExitStatus, GcsError>
where
    F: std::future::Future<Output = Result<ExitStatus, RuntimeError>>,
{
    if timeout_in_ms == NO_TIMEOUT {
        future.await.map_err(|e| GcsError::RuntimeFailed(e.to_string()))
    } else {
        tokio::time::timeout(Duration::from_millis(timeout_in_ms as u64), future)
            .await
            .map_err(|_| GcsError::Timeout)?
            .map_err(|e| GcsError::RuntimeFailed(e.to_string()))
    }
}

pub async fn handle_execute_process<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: ExecuteProcessRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    let params = crate::runtime::ProcessParameters {
        command_line: request.settings.command_line,
        args: request.settings.args,
        working_directory: request.settings.working_directory,
        environment: request.settings.environment,
        create_std_in_pipe: request.settings.create_std_in_pipe,
        create_std_out_pipe: request.settings.create_std_out_pipe,
        create_std_err_pipe: request.settings.create_std_err_pipe,
        is_external: request.settings.is_external,
    };

    let process_id = services
        .runtime
        .exec(&request.base.container_id, &params)
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    let response = ExecuteProcessResponse { process_id };
    Ok((activity_id, serde_json::to_value(response).expect("always serialisable")))
}

/// Withholds the response until the process exits or the timeout elapses,
/// per spec §4.3/§8 S6. The dispatcher runs this in its own worker task, so
/// suspending here never blocks the read loop.
pub async fn handle_wait_for_process<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: WaitForProcessRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    let wait_future = services.runtime.wait(&request.base.container_id, request.process_id, None);

    let status = tokio::select! {
        result = timed_wait(wait_future, request.timeout_in_ms) => result?,
        _ = services.cancel.cancelled() => return Err(GcsError::Cancelled),
    };

    let response = WaitForProcessResponse { exit_code: status.exit_code };
    Ok((activity_id, serde_json::to_value(response).expect("always serialisable")))
}

pub async fn handle_signal_process<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: SignalProcessRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    services
        .runtime
        .signal(&request.base.container_id, request.process_id, request.signal)
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    Ok((activity_id, serde_json::json!({})))
}

pub async fn handle_resize_console<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    payload: &[u8],
) -> Result<(String, serde_json::Value), GcsError> {
    let request: ResizeConsoleRequest =
        serde_json::from_slice(payload).map_err(|e| GcsError::InvalidPayload(e.to_string()))?;
    let activity_id = request.base.activity_id.clone();

    services
        .runtime
        .resize_console(&request.base.container_id, request.process_id, request.height, request.width)
        .await
        .map_err(|e| GcsError::RuntimeFailed(e.to_string()))?;

    Ok((activity_id, serde_json::json!({})))
}
