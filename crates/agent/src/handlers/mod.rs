//! Per-operation request handlers. Each returns the JSON body to place in
//! the response payload (the envelope's `Result`/`ActivityId`/error records
//! are composed by the dispatcher, which is the only place that knows the
//! request's sequence id and original identifier).

mod lifecycle;
mod maintenance;
mod modify;
mod negotiate;
mod process;

pub use lifecycle::{handle_create, handle_shutdown, handle_start};
pub use maintenance::{handle_delete_container_state, handle_dump_stacks, handle_get_properties};
pub use modify::handle_modify_settings;
pub use negotiate::handle_negotiate_protocol;
pub use process::{handle_execute_process, handle_resize_console, handle_signal_process, handle_wait_for_process};

use crate::context::NegotiatedContext;
use crate::dispatcher::NotificationSink;
use crate::mount::MountManager;
use crate::mount::Mounter;
use crate::policy::SecurityPolicy;
use crate::runtime::ContainerRuntime;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Collaborators every handler may need, threaded through rather than
/// reached via global state (spec design note on process-wide globals).
pub struct HandlerServices<M: Mounter, R: ContainerRuntime, P: SecurityPolicy> {
    pub mounts: Arc<MountManager<M>>,
    pub runtime: Arc<R>,
    pub policy: Arc<P>,
    pub negotiated: Arc<Mutex<Option<NegotiatedContext>>>,
    pub cancel: CancellationToken,
    pub notifications: NotificationSink,
}
