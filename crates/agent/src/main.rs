mod config;
mod context;
mod dispatcher;
mod error;
mod handlers;
mod mount;
mod policy;
mod runtime;

use std::sync::Arc;

use tokio_vsock::{VsockAddr, VsockListener, VMADDR_CID_ANY};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::AgentError;
use crate::mount::MountManager;
use crate::policy::AllowAllPolicy;
use crate::runtime::NullRuntime;

struct KernelMounter;

impl mount::Mounter for KernelMounter {
    async fn mount(
        &self,
        _cancel: &tokio_util::sync::CancellationToken,
        controller: u8,
        lun: u8,
        path: &str,
        _config: &mount::MountConfig,
    ) -> Result<(), mount::MountOpError> {
        info!(controller, lun, path, "mounting SCSI device (stub: no physical attach)");
        Ok(())
    }

    async fn unmount(
        &self,
        _cancel: &tokio_util::sync::CancellationToken,
        controller: u8,
        lun: u8,
        path: &str,
        _config: &mount::MountConfig,
    ) -> Result<(), mount::MountOpError> {
        info!(controller, lun, path, "unmounting SCSI device (stub: no physical detach)");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), AgentError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let addr = VsockAddr::new(VMADDR_CID_ANY, config.vsock_port);
    let mut listener = VsockListener::bind(addr)?;
    info!(port = config.vsock_port, "gcs-agent listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "failed to accept vsock connection");
                continue;
            }
        };
        info!(?peer, "accepted HCS connection");

        let config = config.clone();
        tokio::spawn(async move {
            let mounts = Arc::new(MountManager::new(KernelMounter, &config));
            let runtime = NullRuntime::shared();
            let policy = Arc::new(AllowAllPolicy);
            let (dispatcher, outbound_rx) = Dispatcher::new(config, mounts, runtime, policy);
            if let Err(e) = dispatcher.run(stream, outbound_rx).await {
                error!(error = %e, "connection ended with error");
            }
        });
    }
}
