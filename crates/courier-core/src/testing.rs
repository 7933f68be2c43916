//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{Attributes, Message, MessageId, ReceiptHandle};
use crate::error::TransportError;
use crate::ports::Transport;

#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub message_id: MessageId,
    pub body: String,
    pub attributes: Attributes,
    pub delay_seconds: u64,
}

#[derive(Default)]
struct Calls {
    deletes: Vec<ReceiptHandle>,
    sent: Vec<Sent>,
    send_calls: usize,
    receive_calls: usize,
    batches: VecDeque<Result<Vec<Message>, TransportError>>,
}

/// Scripted transport recording every call.
///
/// `receive` pops scripted batches; once they run out it behaves like an
/// idle long poll (sleeps `wait_seconds`, returns nothing).
#[derive(Default)]
pub(crate) struct MockTransport {
    calls: Mutex<Calls>,
    delete_delay: Option<Duration>,
    delete_error: Option<String>,
    send_error: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    pub fn with_delete_error(mut self, message: &str) -> Self {
        self.delete_error = Some(message.to_string());
        self
    }

    pub fn with_send_error(mut self, message: &str) -> Self {
        self.send_error = Some(message.to_string());
        self
    }

    pub fn push_batch(&self, batch: Vec<Message>) {
        self.calls.lock().batches.push_back(Ok(batch));
    }

    pub fn push_receive_error(&self, message: &str) {
        self.calls
            .lock()
            .batches
            .push_back(Err(TransportError::Receive(message.to_string())));
    }

    pub fn deletes(&self) -> Vec<ReceiptHandle> {
        self.calls.lock().deletes.clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.lock().deletes.len()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.calls.lock().sent.clone()
    }

    pub fn send_calls(&self) -> usize {
        self.calls.lock().send_calls
    }

    pub fn receive_calls(&self) -> usize {
        self.calls.lock().receive_calls
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        body: String,
        attributes: Attributes,
        delay_seconds: u64,
    ) -> Result<MessageId, TransportError> {
        let mut calls = self.calls.lock();
        calls.send_calls += 1;
        if let Some(message) = &self.send_error {
            return Err(TransportError::Send(message.clone()));
        }
        let message_id = MessageId::new(format!("sent-{}", calls.send_calls));
        calls.sent.push(Sent {
            message_id: message_id.clone(),
            body,
            attributes,
            delay_seconds,
        });
        Ok(message_id)
    }

    async fn receive(
        &self,
        _max_messages: usize,
        wait_seconds: u64,
    ) -> Result<Vec<Message>, TransportError> {
        let scripted = {
            let mut calls = self.calls.lock();
            calls.receive_calls += 1;
            calls.batches.pop_front()
        };
        match scripted {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(Duration::from_secs(wait_seconds)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<(), TransportError> {
        self.calls.lock().deletes.push(receipt_handle.clone());
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.delete_error {
            Some(message) => Err(TransportError::Delete(message.clone())),
            None => Ok(()),
        }
    }
}

/// Wait (up to 30s of runtime time) until `condition` holds.
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..3_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
