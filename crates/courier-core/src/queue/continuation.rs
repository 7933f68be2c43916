//! Continuations ("then"): callbacks run once a sent message is processed.
//!
//! 送信側が message id で後続処理を登録し、同じ id のメッセージを
//! handler が成功裏に処理したときに登録順で呼び出す。

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::domain::{MessageId, Payload};
use crate::error::HandlerError;

/// A one-shot callback receiving the decoded payload.
#[async_trait]
pub trait Continuation: Send {
    async fn resume(self: Box<Self>, payload: Payload) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> Continuation for F
where
    F: FnOnce(Payload) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn resume(self: Box<Self>, payload: Payload) -> Result<(), HandlerError> {
        (*self)(payload).await
    }
}

/// Message identity -> continuations, in registration order.
///
/// Correlation is by identity only. Resends are always submitted as new
/// messages, so a continuation never fires for a retry of someone else's
/// message.
#[derive(Default)]
pub struct ContinuationRegistry {
    entries: Mutex<HashMap<MessageId, Vec<Box<dyn Continuation>>>>,
}

impl ContinuationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, message_id: MessageId, continuation: Box<dyn Continuation>) {
        self.entries
            .lock()
            .entry(message_id)
            .or_default()
            .push(continuation);
    }

    /// Remove and return everything registered for `message_id`.
    pub fn take(&self, message_id: &MessageId) -> Vec<Box<dyn Continuation>> {
        self.entries.lock().remove(message_id).unwrap_or_default()
    }

    /// Run (and drop) the continuations of `message_id`.
    ///
    /// Failures (panics included) are logged; they do not affect the message
    /// outcome or the continuations after them.
    pub async fn resume(&self, message_id: &MessageId, payload: &Payload) -> usize {
        let continuations = self.take(message_id);
        let count = continuations.len();
        for (index, continuation) in continuations.into_iter().enumerate() {
            match AssertUnwindSafe(continuation.resume(payload.clone()))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(%message_id, index, error = %err, "continuation failed")
                }
                Err(_) => tracing::warn!(%message_id, index, "continuation panicked"),
            }
        }
        count
    }

    /// Identities with at least one pending continuation.
    pub fn pending(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Handle returned by a send; attach continuations with [`Pending::then`].
pub struct Pending {
    message_id: MessageId,
    continuations: Arc<ContinuationRegistry>,
}

impl Pending {
    pub(crate) fn new(message_id: MessageId, continuations: Arc<ContinuationRegistry>) -> Self {
        Self {
            message_id,
            continuations,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Run `continuation` once a handler processed this message successfully.
    ///
    /// Registered before the message is consumed, it fires at most once.
    pub fn then<F, Fut>(self, continuation: F) -> Self
    where
        F: FnOnce(Payload) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.continuations
            .register(self.message_id.clone(), Box::new(continuation));
        self
    }
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("message_id", &self.message_id)
            .finish()
    }
}
