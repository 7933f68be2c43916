//! Acknowledgment supervisor.
//!
//! Each received message gets its own task that deletes it from the queue and
//! then runs the handler. The caller waits for the delete (not the handler),
//! bounded by the configured timeout. When the deadline wins, the caller sees
//! `AckTimeout` while the task keeps going and still applies the ledger,
//! continuation and resend effects. The caller's view of a timed-out message
//! may therefore disagree with what the background task ends up doing.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

use super::{FailureRecord, Queue};
use crate::domain::{AckState, Message, MessageId, decode};
use crate::error::{CourierError, HandlerError};
use crate::runtime::MessageHandler;

impl Queue {
    /// Delete `message` and dispatch it to `handler` under the ack deadline.
    ///
    /// Returns once the message is deleted (handler still running in the
    /// background), the delete failed, or the deadline passed.
    #[instrument(
        skip_all,
        fields(message_id = ?message.message_id, method = %message.method())
    )]
    pub async fn handle_message(
        &self,
        handler: Arc<dyn MessageHandler>,
        message: Message,
    ) -> Result<(), CourierError> {
        let message_id = message
            .message_id
            .clone()
            .ok_or(CourierError::MessageIdentityMissing)?;

        if let Err(err) = self.ledger.admit(&message_id) {
            error!(error = %err, "drop request from queue");
            return Err(err);
        }

        let (done_tx, done_rx) = oneshot::channel();
        let unit = AckUnit::new(self.clone(), handler, message, message_id);
        tokio::spawn(unit.run(done_tx));

        let timeout = self.config.ack_timeout();
        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(outcome)) => {
                if outcome.is_ok() {
                    info!("processed message from queue");
                }
                outcome
            }
            Ok(Err(_)) => Err(CourierError::AckUnitLost),
            Err(_) => {
                warn!(?timeout, "message not acknowledged in time");
                Err(CourierError::AckTimeout(timeout))
            }
        }
    }
}

/// The delete-then-dispatch unit for one message.
pub(super) struct AckUnit {
    queue: Queue,
    handler: Arc<dyn MessageHandler>,
    message: Message,
    message_id: MessageId,
    state: AckState,
}

impl AckUnit {
    pub(super) fn new(
        queue: Queue,
        handler: Arc<dyn MessageHandler>,
        message: Message,
        message_id: MessageId,
    ) -> Self {
        Self {
            queue,
            handler,
            message,
            message_id,
            state: AckState::Deleting,
        }
    }

    fn advance(&mut self, next: AckState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal ack transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(message_id = %self.message_id, from = ?self.state, to = ?next, "ack state");
        self.state = next;
    }

    /// Run to a terminal state. `done` gets the caller-visible outcome as
    /// soon as the delete settles; if nobody listens any more it is dropped.
    pub(super) async fn run(
        mut self,
        done: oneshot::Sender<Result<(), CourierError>>,
    ) -> AckState {
        let deleted = self
            .queue
            .transport
            .delete(&self.message.receipt_handle)
            .await;

        if let Err(err) = deleted {
            // Still on the queue: the visibility timeout brings it back.
            self.advance(AckState::DeleteFailed);
            error!(message_id = %self.message_id, error = %err, "deleting message failed");
            let _ = done.send(Err(err.into()));
            return self.state;
        }

        self.advance(AckState::Deleted);
        self.queue.ledger.observe(&self.message_id);

        // Release the caller now; holding it until the handler finishes would
        // let slow handlers stall the listen loop.
        let _ = done.send(Ok(()));

        self.dispatch().await
    }

    async fn dispatch(mut self) -> AckState {
        self.advance(AckState::Dispatching);
        let payload = decode(&self.message.body);

        // panic も失敗として扱う（削除済みなので、ここで落ちるとメッセージが消える）
        let outcome = AssertUnwindSafe(self.handler.handle(payload.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_error(panic)));

        match outcome {
            Ok(()) => {
                self.advance(AckState::HandlerSucceeded);
                self.queue.ledger.clear(&self.message_id);
                let resumed = self
                    .queue
                    .continuations
                    .resume(&self.message_id, &payload)
                    .await;
                debug!(message_id = %self.message_id, resumed, "handler succeeded");
            }
            Err(err) => {
                error!(message_id = %self.message_id, error = %err, "running handler error");
                self.advance(AckState::HandlerFailed);
                self.after_failure().await;
            }
        }

        self.state
    }

    async fn after_failure(&mut self) {
        match self.queue.ledger.record_failure(&self.message_id) {
            FailureRecord::Exhausted => {
                self.advance(AckState::RetriesExhausted);
                error!(
                    message_id = %self.message_id,
                    max_retries = self.queue.ledger.max_retries(),
                    "drop request from queue: retries exhausted"
                );
            }
            FailureRecord::Counted(failures) => {
                self.advance(AckState::RetryScheduled);
                debug!(message_id = %self.message_id, failures, "retry scheduled");
                // Not retried further here; the original was already deleted.
                match self.queue.resend(&self.message).await {
                    Ok(resent) => self.queue.ledger.carry(&self.message_id, resent),
                    Err(err) => {
                        error!(message_id = %self.message_id, error = %err, "resending message to queue");
                        self.queue.ledger.clear(&self.message_id);
                    }
                }
            }
        }
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> HandlerError {
    let reason = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("handler panicked: {reason}").into()
}
