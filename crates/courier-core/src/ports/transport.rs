//! Transport port: an at-least-once, visibility-timeout based queue.

use async_trait::async_trait;

use crate::domain::{Attributes, Message, MessageId, ReceiptHandle};
use crate::error::TransportError;

/// Queue transport consumed by the core.
///
/// Implementations own the network (or in-memory) mechanics. A received
/// message stays invisible to other consumers until its visibility timeout
/// expires; deleting it by receipt handle removes it for good.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a new message. Delivery is delayed by `delay_seconds`.
    async fn send(
        &self,
        body: String,
        attributes: Attributes,
        delay_seconds: u64,
    ) -> Result<MessageId, TransportError>;

    /// Fetch up to `max_messages`, waiting at most `wait_seconds` for the
    /// first one to show up. An empty batch is not an error.
    async fn receive(
        &self,
        max_messages: usize,
        wait_seconds: u64,
    ) -> Result<Vec<Message>, TransportError>;

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<(), TransportError>;
}
