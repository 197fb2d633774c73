//! WebSocket connection state machine.
//!
//! [`run_connection`] owns one socket for its whole life. It decodes each
//! inbound frame, dispatches it through [`Connection::handle_frame`], and is
//! the only writer to the socket: replies produced by the state machine are
//! written directly, frames from operation runners and the keep-alive timer
//! arrive through the [`Outbound`] queue.
//!
//! ```text
//!   transport.receive() ──► Connection::handle_frame ──► replies ─┐
//!                                   │ spawn                       │
//!                                   ▼                             ▼
//!                           OperationRunner ──► Outbound ──► transport.send()
//!                           KeepAlive       ──┘
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use super::keep_alive::KeepAlive;
use super::messages::{self, ProtocolMessage};
use super::operation::{CancelReason, Operation, OperationHandle, OperationRunner};
use super::outbound::Outbound;
use super::registry::OperationRegistry;
use super::transport::{CLOSE_NORMAL, Transport};
use crate::config::ConnectionConfig;
use crate::engine::{GraphQLEngine, GraphQLError, GraphQLRequest, RequestContext};
use crate::error::TransportError;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, waiting for `connection_init`.
    New,
    /// `connection_ack` sent; operations may run.
    Acknowledged,
    /// `connection_terminate` received; the socket is being closed.
    Closing,
    /// Torn down. Nothing is read or written any more.
    Closed,
}

/// What the run loop does after a frame has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Close the socket and stop.
    Close,
}

/// Result of handling one inbound frame.
#[derive(Debug, PartialEq)]
pub struct Step {
    /// Frames to write immediately, in order.
    pub replies: Vec<ProtocolMessage>,
    /// Whether the connection goes on.
    pub flow: Flow,
}

impl Step {
    fn none() -> Self {
        Self {
            replies: Vec::new(),
            flow: Flow::Continue,
        }
    }

    fn reply(message: ProtocolMessage) -> Self {
        Self {
            replies: vec![message],
            flow: Flow::Continue,
        }
    }

    fn close() -> Self {
        Self {
            replies: Vec::new(),
            flow: Flow::Close,
        }
    }
}

/// Protocol state of one connection.
///
/// Pure dispatch: it never touches the socket. Runners and the keep-alive
/// timer it spawns write through `outbound`.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    state: ConnectionState,
    engine: Arc<dyn GraphQLEngine>,
    config: ConnectionConfig,
    outbound: Outbound,
    finished: mpsc::UnboundedSender<String>,
    operations: OperationRegistry,
    keep_alive: Option<KeepAlive>,
    connection_params: Option<Value>,
}

impl Connection {
    /// Creates a connection in [`ConnectionState::New`].
    ///
    /// Runners report their id on `finished` when they end; feed those ids
    /// back through [`Connection::operation_finished`].
    #[must_use]
    pub fn new(
        id: Uuid,
        engine: Arc<dyn GraphQLEngine>,
        config: ConnectionConfig,
        outbound: Outbound,
        finished: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            state: ConnectionState::New,
            engine,
            config,
            outbound,
            finished,
            operations: OperationRegistry::new(),
            keep_alive: None,
            connection_params: None,
        }
    }

    /// Connection id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of operations still registered.
    #[must_use]
    pub fn active_operations(&self) -> usize {
        self.operations.len()
    }

    /// Handles one inbound text frame.
    pub fn handle_frame(&mut self, frame: &str) -> Step {
        if matches!(
            self.state,
            ConnectionState::Closing | ConnectionState::Closed
        ) {
            return Step::none();
        }

        let message = match messages::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "protocol error");
                return Step::reply(ProtocolMessage::connection_error(e.to_string()));
            }
        };

        match message {
            ProtocolMessage::ConnectionInit { payload } => self.init(payload),
            ProtocolMessage::ConnectionTerminate => {
                tracing::debug!("client terminated connection");
                self.state = ConnectionState::Closing;
                Step::close()
            }
            ProtocolMessage::Start { id, payload } => {
                if self.state == ConnectionState::New {
                    return not_acknowledged("start");
                }
                self.start(id, payload)
            }
            ProtocolMessage::Stop { id } => {
                if self.state == ConnectionState::New {
                    return not_acknowledged("stop");
                }
                if !self.operations.stop(&id) {
                    match self.operations.get(&id) {
                        Some(handle) => tracing::debug!(
                            operation_id = %id,
                            state = ?handle.state(),
                            "operation already stopping"
                        ),
                        None => tracing::debug!(operation_id = %id, "stop for inactive operation ignored"),
                    }
                }
                Step::none()
            }
            other => {
                tracing::warn!(message_type = other.type_name(), "unexpected message type");
                Step::reply(ProtocolMessage::connection_error(format!(
                    "unexpected message type: {}",
                    other.type_name()
                )))
            }
        }
    }

    /// Forgets an operation whose runner has ended.
    pub fn operation_finished(&mut self, id: &str) {
        if self.operations.finished(id).is_some() {
            tracing::trace!(operation_id = %id, "operation removed");
        }
    }

    /// Tears the connection down: stops keep-alive and cancels every
    /// operation without a trailing `complete`.
    ///
    /// Returns the cancelled handles so the caller can wait for them.
    pub fn shutdown(&mut self) -> Vec<OperationHandle> {
        self.state = ConnectionState::Closed;
        if let Some(timer) = self.keep_alive.take() {
            timer.stop();
        }
        if !self.operations.is_empty() {
            tracing::debug!(count = self.operations.len(), "cancelling operations");
        }
        self.operations.cancel_all(CancelReason::ConnectionClosed)
    }

    fn init(&mut self, payload: Option<Value>) -> Step {
        if self.state == ConnectionState::Acknowledged {
            tracing::debug!("repeated connection_init acknowledged");
            return Step::reply(ProtocolMessage::ConnectionAck);
        }

        self.connection_params = payload;
        self.state = ConnectionState::Acknowledged;
        if let Some(interval) = self.config.keep_alive_interval {
            self.keep_alive = Some(KeepAlive::spawn(interval, self.outbound.clone()));
        }
        tracing::debug!("connection acknowledged");
        Step::reply(ProtocolMessage::ConnectionAck)
    }

    fn start(&mut self, id: String, request: GraphQLRequest) -> Step {
        if self.operations.contains(&id) {
            tracing::debug!(operation_id = %id, "duplicate start ignored");
            return Step::none();
        }

        if let Err(errors) = self.engine.validate(&request.query) {
            tracing::debug!(operation_id = %id, count = errors.len(), "validation failed");
            let first = errors
                .into_iter()
                .next()
                .unwrap_or_else(|| GraphQLError::new("Invalid query."));
            return Step::reply(ProtocolMessage::error(id, first));
        }

        if self.config.max_operations > 0 && self.operations.len() >= self.config.max_operations {
            tracing::warn!(operation_id = %id, limit = self.config.max_operations, "operation limit reached");
            return Step::reply(ProtocolMessage::error(
                id,
                GraphQLError::new("too many active operations"),
            ));
        }

        let context = RequestContext {
            connection_id: self.id,
            connection_params: self.connection_params.clone(),
        };
        let handle = OperationRunner::spawn(
            Operation::new(id, request),
            Arc::clone(&self.engine),
            context,
            self.outbound.clone(),
            self.finished.clone(),
        );
        if let Err(rejected) = self.operations.insert(handle) {
            tracing::debug!(operation_id = %rejected.id(), "operation already registered");
        }
        Step::none()
    }
}

fn not_acknowledged(message_type: &str) -> Step {
    tracing::warn!(message_type, "message before connection_ack");
    Step::reply(ProtocolMessage::connection_error(format!(
        "connection not acknowledged: send connection_init before {message_type}"
    )))
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Terminated,
    PeerClosed,
    TransportFailed,
}

/// Runs one connection until the client terminates, the peer closes, or
/// the transport fails.
///
/// Every active operation is cancelled on the way out and no frame is
/// written after the loop ends.
pub async fn run_connection<T: Transport>(
    transport: T,
    engine: Arc<dyn GraphQLEngine>,
    config: ConnectionConfig,
) {
    let connection_id = Uuid::new_v4();
    let span = tracing::info_span!("ws_connection", %connection_id);
    serve(transport, engine, config, connection_id)
        .instrument(span)
        .await;
}

async fn serve<T: Transport>(
    mut transport: T,
    engine: Arc<dyn GraphQLEngine>,
    config: ConnectionConfig,
    connection_id: Uuid,
) {
    let (outbound, mut outbound_rx) = Outbound::channel(config.outbound_buffer);
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
    let mut connection = Connection::new(connection_id, engine, config, outbound, finished_tx);
    tracing::info!("ws connection accepted");

    let exit = loop {
        tokio::select! {
            Some(id) = finished_rx.recv() => connection.operation_finished(&id),
            Some(message) = outbound_rx.recv() => {
                if let Err(e) = write(&mut transport, &message).await {
                    tracing::debug!(error = %e, "write failed");
                    break Exit::TransportFailed;
                }
            }
            inbound = transport.receive() => match inbound {
                Some(Ok(frame)) => {
                    while let Ok(id) = finished_rx.try_recv() {
                        connection.operation_finished(&id);
                    }
                    let step = connection.handle_frame(&frame);
                    if write_all(&mut transport, &step.replies).await.is_err() {
                        break Exit::TransportFailed;
                    }
                    if step.flow == Flow::Close {
                        break Exit::Terminated;
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "read failed");
                    break Exit::TransportFailed;
                }
                None => break Exit::PeerClosed,
            },
        }
    };

    let handles = connection.shutdown();
    drop(outbound_rx);
    if exit == Exit::Terminated
        && let Err(e) = transport.close(CLOSE_NORMAL, "terminated").await
    {
        tracing::debug!(error = %e, "close failed");
    }
    for handle in handles {
        handle.join().await;
    }
    tracing::info!(?exit, "ws connection closed");
}

async fn write<T: Transport>(
    transport: &mut T,
    message: &ProtocolMessage,
) -> Result<(), TransportError> {
    match messages::encode(message) {
        Ok(text) => {
            tracing::trace!(
                message_type = message.type_name(),
                operation_id = ?message.id(),
                "writing frame"
            );
            transport.send(text).await
        }
        Err(e) => {
            tracing::warn!(error = %e, message_type = message.type_name(), "dropping frame");
            Ok(())
        }
    }
}

async fn write_all<T: Transport>(
    transport: &mut T,
    replies: &[ProtocolMessage],
) -> Result<(), TransportError> {
    for reply in replies {
        write(transport, reply).await?;
    }
    Ok(())
}
