//! One client-issued operation and the task that drives it.
//!
//! An [`OperationRunner`] executes its request through the engine, turns
//! each result into a `data` frame, and finishes with `complete` unless the
//! connection itself went away. The owning connection keeps the returned
//! [`OperationHandle`] to cancel the runner and observe its state.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::messages::ProtocolMessage;
use super::outbound::Outbound;
use crate::engine::{Execution, GraphQLEngine, GraphQLRequest, GraphQLResponse, RequestContext};

/// Lifecycle of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Registered, engine not called yet.
    Pending,
    /// Engine call issued; results may be flowing.
    Running,
    /// Finished: exhausted, failed, or cancelled.
    Completed,
}

/// Why a runner is being cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The client sent `stop`; the runner still emits `complete`.
    Stop,
    /// The connection is going away; nothing more is emitted.
    ConnectionClosed,
}

/// A client-issued operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Client-chosen id, unique among the connection's active operations.
    pub id: String,
    /// The request as the client sent it.
    pub request: GraphQLRequest,
}

impl Operation {
    /// Creates an operation.
    #[must_use]
    pub fn new(id: impl Into<String>, request: GraphQLRequest) -> Self {
        Self {
            id: id.into(),
            request,
        }
    }
}

/// How a runner's drive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// The result source ended on its own.
    Exhausted,
    /// Cancelled by `stop`.
    Stopped,
    /// The connection stopped listening.
    Detached,
}

impl From<Result<CancelReason, oneshot::error::RecvError>> for Outcome {
    fn from(reason: Result<CancelReason, oneshot::error::RecvError>) -> Self {
        match reason {
            Ok(CancelReason::Stop) => Self::Stopped,
            Ok(CancelReason::ConnectionClosed) | Err(_) => Self::Detached,
        }
    }
}

/// Connection-side handle to a spawned runner.
///
/// Dropping the handle cancels the runner as [`CancelReason::ConnectionClosed`].
#[derive(Debug)]
pub struct OperationHandle {
    id: String,
    cancel: Option<oneshot::Sender<CancelReason>>,
    state: watch::Receiver<OperationState>,
    task: JoinHandle<()>,
}

impl OperationHandle {
    /// Operation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> OperationState {
        *self.state.borrow()
    }

    /// Asks the runner to stop. Only the first call has an effect.
    ///
    /// Returns `true` if the runner was still listening.
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        self.cancel
            .take()
            .is_some_and(|tx| tx.send(reason).is_ok())
    }

    /// Returns `true` once [`OperationHandle::cancel`] has been called.
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.cancel.is_none()
    }

    /// Waits for the runner task to end.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Drives one operation's results to the connection.
#[derive(Debug)]
pub struct OperationRunner {
    operation: Operation,
    engine: Arc<dyn GraphQLEngine>,
    context: RequestContext,
    outbound: Outbound,
    finished: mpsc::UnboundedSender<String>,
    state: watch::Sender<OperationState>,
}

impl OperationRunner {
    /// Spawns a runner for `operation`.
    ///
    /// When the runner ends, for whatever reason, its id is sent on
    /// `finished` so the connection can forget it.
    #[must_use]
    pub fn spawn(
        operation: Operation,
        engine: Arc<dyn GraphQLEngine>,
        context: RequestContext,
        outbound: Outbound,
        finished: mpsc::UnboundedSender<String>,
    ) -> OperationHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(OperationState::Pending);
        let id = operation.id.clone();
        let span = tracing::debug_span!("operation", operation_id = %id);

        let runner = Self {
            operation,
            engine,
            context,
            outbound,
            finished,
            state: state_tx,
        };
        let task = tokio::spawn(runner.run(cancel_rx).instrument(span));

        OperationHandle {
            id,
            cancel: Some(cancel_tx),
            state: state_rx,
            task,
        }
    }

    async fn run(self, mut cancel: oneshot::Receiver<CancelReason>) {
        self.state.send_replace(OperationState::Running);
        let outcome = self.drive(&mut cancel).await;
        tracing::debug!(?outcome, "operation finished");

        if matches!(outcome, Outcome::Exhausted | Outcome::Stopped) {
            self.outbound
                .send(ProtocolMessage::complete(self.operation.id.as_str()))
                .await;
        }
        self.state.send_replace(OperationState::Completed);
        let _ = self.finished.send(self.operation.id.clone());
    }

    async fn drive(&self, cancel: &mut oneshot::Receiver<CancelReason>) -> Outcome {
        let execution = tokio::select! {
            biased;
            reason = &mut *cancel => return Outcome::from(reason),
            execution = self.engine.execute(self.operation.request.clone(), self.context.clone()) => execution,
        };

        let mut results = match execution {
            Execution::Single(response) => {
                return if self.emit(response).await {
                    Outcome::Exhausted
                } else {
                    Outcome::Detached
                };
            }
            Execution::Stream(results) => results,
        };

        loop {
            tokio::select! {
                biased;
                reason = &mut *cancel => return Outcome::from(reason),
                next = results.next() => match next {
                    Some(Ok(response)) => {
                        if !self.emit(response).await {
                            return Outcome::Detached;
                        }
                    }
                    Some(Err(error)) => {
                        tracing::warn!(%error, "result stream failed");
                        if !self.emit(GraphQLResponse::from_errors(vec![error])).await {
                            return Outcome::Detached;
                        }
                        return Outcome::Exhausted;
                    }
                    None => return Outcome::Exhausted,
                },
            }
        }
    }

    async fn emit(&self, response: GraphQLResponse) -> bool {
        self.outbound
            .send(ProtocolMessage::data(self.operation.id.as_str(), response))
            .await
    }
}
