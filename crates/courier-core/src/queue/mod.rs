//! Queue: send path, handler routing, acknowledgment supervision and the
//! listen loop on top of a [`Transport`].

mod continuation;
mod ledger;
mod listen;
mod retry;
mod supervisor;

pub use continuation::{Continuation, ContinuationRegistry, Pending};
pub use ledger::{FailureRecord, RetryLedger};
pub use retry::{BackoffPolicy, Outgoing};

use std::sync::Arc;

use serde::Serialize;

use crate::config::QueueConfig;
use crate::domain::{Message, MessageId, encode};
use crate::error::CourierError;
use crate::observability::QueueStats;
use crate::ports::Transport;
use crate::runtime::{HandlerRegistry, MessageHandler};

/// A reliable queue client.
///
/// Cloning is cheap; clones share the transport, handlers, retry ledger and
/// continuation registry.
#[derive(Clone)]
pub struct Queue {
    transport: Arc<dyn Transport>,
    config: Arc<QueueConfig>,
    backoff: BackoffPolicy,
    handlers: Arc<HandlerRegistry>,
    ledger: Arc<RetryLedger>,
    continuations: Arc<ContinuationRegistry>,
}

impl Queue {
    pub fn new(transport: Arc<dyn Transport>, config: QueueConfig) -> Result<Self, CourierError> {
        config.validate()?;
        Ok(Self {
            transport,
            backoff: BackoffPolicy::new(config.backoff_step()),
            ledger: Arc::new(RetryLedger::new(config.max_retries)),
            config: Arc::new(config),
            handlers: Arc::new(HandlerRegistry::new()),
            continuations: Arc::new(ContinuationRegistry::new()),
        })
    }

    pub fn ledger(&self) -> &RetryLedger {
        &self.ledger
    }

    /// Register `handler` for messages whose `Method` attribute is `name`.
    /// Use `""` for the default handler.
    pub fn register<H: MessageHandler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.handlers.register(name, Arc::new(handler));
    }

    /// Send a raw body.
    pub async fn put_string(
        &self,
        method: &str,
        body: impl Into<String>,
        delay_seconds: u64,
    ) -> Result<Pending, CourierError> {
        let outgoing = self.backoff.outgoing(method, body.into(), delay_seconds);
        let message_id = self.submit(outgoing).await?;
        tracing::debug!(%message_id, method, delay_seconds, "message sent");
        Ok(Pending::new(message_id, Arc::clone(&self.continuations)))
    }

    /// Envelope-encode `payload` and send it.
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        method: &str,
        payload: &T,
        delay_seconds: u64,
    ) -> Result<Pending, CourierError> {
        let body = encode(payload)?;
        self.put_string(method, body, delay_seconds).await
    }

    /// Find the handler for `message` by its `Method` attribute.
    pub fn route(&self, message: &Message) -> Result<Arc<dyn MessageHandler>, CourierError> {
        self.handlers.route(message.method())
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            tracked_failures: self.ledger.len(),
            pending_continuations: self.continuations.pending(),
            handlers: self.handlers.names(),
        }
    }

    async fn submit(&self, outgoing: Outgoing) -> Result<MessageId, CourierError> {
        let Outgoing {
            body,
            attributes,
            delay_seconds,
        } = outgoing;
        Ok(self.transport.send(body, attributes, delay_seconds).await?)
    }

    /// Submit a new copy of a failed message (new identity).
    async fn resend(&self, message: &Message) -> Result<MessageId, CourierError> {
        let outgoing = self.backoff.resend(message)?;
        let delay_seconds = outgoing.delay_seconds;
        let message_id = self.submit(outgoing).await?;
        tracing::info!(%message_id, delay_seconds, "message resent");
        Ok(message_id)
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
