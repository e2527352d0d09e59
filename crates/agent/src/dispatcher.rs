//! The bridge dispatcher: single reader task, worker-per-request
//! concurrency, single serialized writer task (spec §4.3/§5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use protocol::error::{ErrorRecord, MessageResponseBase};
use protocol::identifier::MessageIdentifier;
use protocol::registry::{notification_identifier, RequestId};
use protocol::{framing, GcsError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::config::Config;
use crate::context::NegotiatedContext;
use crate::error::AgentError;
use crate::handlers::{self, HandlerServices};
use crate::mount::{MountManager, Mounter};
use crate::policy::SecurityPolicy;
use crate::runtime::ContainerRuntime;

/// Per-connection lifecycle state (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninit,
    Negotiated,
    Active,
    Draining,
    Closed,
}

/// An outbound frame queued for the single writer task.
pub(crate) struct OutboundFrame {
    identifier: MessageIdentifier,
    sequence_id: u64,
    payload: Vec<u8>,
}

/// Handle given to handlers (and, in a fuller build, to runtime notification
/// callbacks) for pushing frames through the single serialized writer.
///
/// Notifications carry their own guest-assigned `SequenceID`, distinct from
/// the host-assigned ids on requests/responses (spec §3), so the sink owns
/// its own counter rather than taking a caller-supplied sequence id.
#[derive(Clone)]
pub struct NotificationSink {
    sender: mpsc::Sender<OutboundFrame>,
    next_sequence_id: Arc<AtomicU64>,
}

impl NotificationSink {
    pub async fn send_notification(&self, notification: &protocol::notification::Notification) {
        let sequence_id = self.next_sequence_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(notification).expect("Notification always serialises");
        let _ = self
            .sender
            .send(OutboundFrame {
                identifier: notification_identifier(),
                sequence_id,
                payload,
            })
            .await;
    }

    /// Builds a sink over a caller-supplied channel, for driving handlers
    /// directly in unit tests without a full [`Dispatcher`].
    #[cfg(test)]
    pub(crate) fn for_test(sender: mpsc::Sender<OutboundFrame>) -> Self {
        Self { sender, next_sequence_id: Arc::new(AtomicU64::new(1)) }
    }
}

pub struct Dispatcher<M: Mounter, R: ContainerRuntime, P: SecurityPolicy> {
    config: Arc<Config>,
    state: Arc<Mutex<ConnectionState>>,
    services: Arc<HandlerServices<M, R, P>>,
    outbound_tx: mpsc::Sender<OutboundFrame>,
}

impl<M, R, P> Dispatcher<M, R, P>
where
    M: Mounter + 'static,
    R: ContainerRuntime + 'static,
    P: SecurityPolicy + 'static,
{
    pub fn new(config: Config, mounts: Arc<MountManager<M>>, runtime: Arc<R>, policy: Arc<P>) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let notifications = NotificationSink {
            sender: outbound_tx.clone(),
            next_sequence_id: Arc::new(AtomicU64::new(1)),
        };
        let services = Arc::new(HandlerServices {
            mounts,
            runtime,
            policy,
            negotiated: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            notifications,
        });
        let dispatcher = Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(ConnectionState::Uninit)),
            services,
            outbound_tx,
        };
        (dispatcher, outbound_rx)
    }

    pub fn notification_sink(&self) -> NotificationSink {
        self.services.notifications.clone()
    }

    /// Drives one connection end to end: a reader loop that spawns a worker
    /// per request, paired with a writer task draining `outbound_rx` onto
    /// `writer`. Returns once the transport closes or a fatal error occurs.
    #[instrument(skip_all)]
    /// Consumes the dispatcher so its own outbound sender is dropped once
    /// the read loop ends — otherwise the writer task's `recv()` would
    /// never see the channel close.
    pub async fn run<S>(self, stream: S, mut outbound_rx: mpsc::Receiver<OutboundFrame>) -> Result<(), AgentError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut read_half, mut write_half) = tokio::io::split(stream);

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = framing::write_frame(&mut write_half, frame.identifier, frame.sequence_id, &frame.payload).await {
                    error!(error = %e, "writer task failed, closing connection");
                    break;
                }
            }
        });

        let result = self.read_loop(&mut read_half).await;

        *self.state.lock().await = ConnectionState::Closed;
        self.services.cancel.cancel();
        drop(self);
        let _ = writer_task.await;

        result
    }

    async fn read_loop<S>(&self, stream: &mut S) -> Result<(), AgentError>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            if *self.state.lock().await == ConnectionState::Draining {
                debug!("connection draining, stopping read loop");
                return Ok(());
            }

            let (header, payload) = match framing::read_frame(stream, self.config.max_frame_bytes).await {
                Ok(frame) => frame,
                Err(framing::FramingError::ShortRead) => {
                    debug!("transport closed");
                    return Ok(());
                }
                Err(e) => return Err(GcsError::Framing(e).into()),
            };

            let request_id = match RequestId::from_identifier(header.identifier) {
                Some(id) => id,
                None => {
                    warn!(identifier = ?header.identifier, "unknown message identifier");
                    self.respond_error(
                        header.identifier.response_identifier_of(),
                        header.sequence_id,
                        String::new(),
                        &GcsError::InvalidMessageType { id: header.identifier.raw() },
                    )
                    .await;
                    continue;
                }
            };

            if let Err(violation) = self.check_state_allows(request_id).await {
                let activity_id = extract_activity_id(&payload).unwrap_or_default();
                self.respond_error(header.identifier.response_identifier_of(), header.sequence_id, activity_id, &violation)
                    .await;
                return Err(violation.into());
            }

            self.advance_state_for(request_id).await;

            let services = self.services.clone();
            let outbound_tx = self.outbound_tx.clone();
            let state = self.state.clone();
            let response_identifier = header.identifier.response_identifier_of();
            let sequence_id = header.sequence_id;

            tokio::spawn(async move {
                let outcome = dispatch_request(&services, request_id, &payload).await;
                if request_id == RequestId::ShutdownGraceful || request_id == RequestId::ShutdownForced {
                    *state.lock().await = ConnectionState::Draining;
                }
                let envelope = match outcome {
                    Ok((activity_id, body)) => success_envelope(activity_id, body),
                    Err((activity_id, err)) => failure_envelope(activity_id, &err),
                };
                let payload = serde_json::to_vec(&envelope).expect("response envelope always serialises");
                let _ = outbound_tx.send(OutboundFrame { identifier: response_identifier, sequence_id, payload }).await;
            });
        }
    }

    async fn check_state_allows(&self, request_id: RequestId) -> Result<(), GcsError> {
        let state = *self.state.lock().await;
        let allowed = match state {
            ConnectionState::Uninit => matches!(request_id, RequestId::NegotiateProtocol),
            ConnectionState::Negotiated => matches!(
                request_id,
                RequestId::Create | RequestId::DumpStacks | RequestId::DeleteContainerState
            ),
            ConnectionState::Active => true,
            ConnectionState::Draining | ConnectionState::Closed => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(GcsError::ProtocolViolation(format!("{request_id:?} not valid in state {state:?}")))
        }
    }

    async fn advance_state_for(&self, request_id: RequestId) {
        let mut state = self.state.lock().await;
        match (*state, request_id) {
            (ConnectionState::Uninit, RequestId::NegotiateProtocol) => *state = ConnectionState::Negotiated,
            (ConnectionState::Negotiated, RequestId::Create) => *state = ConnectionState::Active,
            _ => {}
        }
    }

    async fn respond_error(&self, identifier: MessageIdentifier, sequence_id: u64, activity_id: String, err: &GcsError) {
        let envelope = failure_envelope(activity_id, err);
        let payload = serde_json::to_vec(&envelope).expect("response envelope always serialises");
        let _ = self.outbound_tx.send(OutboundFrame { identifier, sequence_id, payload }).await;
    }
}

type HandlerResult = Result<(String, serde_json::Value), (String, GcsError)>;

async fn dispatch_request<M: Mounter, R: ContainerRuntime, P: SecurityPolicy>(
    services: &HandlerServices<M, R, P>,
    request_id: RequestId,
    payload: &[u8],
) -> HandlerResult {
    let outcome = match request_id {
        RequestId::NegotiateProtocol => handlers::handle_negotiate_protocol(services, payload)
            .await
            .map(|body| (String::new(), body)),
        RequestId::Create => handlers::handle_create(services, payload).await,
        RequestId::Start => handlers::handle_start(services, payload).await,
        RequestId::ShutdownGraceful => handlers::handle_shutdown(services, payload, false).await,
        RequestId::ShutdownForced => handlers::handle_shutdown(services, payload, true).await,
        RequestId::ExecuteProcess => handlers::handle_execute_process(services, payload).await,
        RequestId::WaitForProcess => handlers::handle_wait_for_process(services, payload).await,
        RequestId::SignalProcess => handlers::handle_signal_process(services, payload).await,
        RequestId::ResizeConsole => handlers::handle_resize_console(services, payload).await,
        RequestId::GetProperties => handlers::handle_get_properties(services, payload).await,
        RequestId::ModifySettings => handlers::handle_modify_settings(services, payload).await,
        RequestId::DumpStacks => handlers::handle_dump_stacks(services, payload).await,
        RequestId::DeleteContainerState => handlers::handle_delete_container_state(services, payload).await,
    };
    outcome.map_err(|err| {
        let activity_id = extract_activity_id(payload).unwrap_or_default();
        (activity_id, err)
    })
}

/// Best-effort recovery of `ActivityId` from a payload that failed to
/// decode into its full request shape, so even decode failures echo it.
fn extract_activity_id(payload: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("ActivityId")?.as_str().map(str::to_owned)
}

fn success_envelope(activity_id: String, body: serde_json::Value) -> serde_json::Value {
    let mut envelope = serde_json::to_value(MessageResponseBase::success(activity_id)).expect("always serialisable");
    merge_body(&mut envelope, body);
    envelope
}

fn failure_envelope(activity_id: String, err: &GcsError) -> serde_json::Value {
    let record: ErrorRecord = err.to_error_record();
    serde_json::to_value(MessageResponseBase::failure(activity_id, vec![record])).expect("always serialisable")
}

fn merge_body(envelope: &mut serde_json::Value, body: serde_json::Value) {
    if let (Some(envelope_map), serde_json::Value::Object(body_map)) = (envelope.as_object_mut(), body) {
        envelope_map.extend(body_map);
    }
}
