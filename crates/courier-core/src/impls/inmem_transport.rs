//! InMemoryTransport - 開発用・テスト用の Transport
//!
//! SQS の振る舞いのうち、このクレートが前提にしているものだけを再現する。
//! - 送信ごとに ULID の message id を採番
//! - 受信ごとに新しい receipt handle を払い出す
//! - delay_seconds の間は受信できない
//! - 受信後 visibility timeout 内に delete されなければ再び見えるようになる
//! - receive は wait_seconds まで long poll する
//! - redrive: max receive count を超えたメッセージは dead letter に移す

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use ulid::Ulid;

use crate::domain::{Attributes, Message, MessageId, ReceiptHandle};
use crate::error::TransportError;
use crate::ports::Transport;

pub const VISIBILITY_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

/// SQS の上限（12 時間）
pub const VISIBILITY_TIMEOUT_MAX: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug)]
struct Stored {
    message_id: MessageId,
    body: String,
    attributes: Attributes,
    visible_at: Instant,
    /// 直近の受信で払い出した receipt。未受信なら None
    receipt: Option<ReceiptHandle>,
    receive_count: u32,
}

pub struct InMemoryTransport {
    /// 送信順に保持する
    messages: Mutex<Vec<Stored>>,
    dead_letters: Mutex<Vec<Stored>>,
    /// send 時と可視化待ちの受信者を起こす
    arrivals: Notify,
    visibility_timeout: Duration,
    /// None なら redrive しない
    max_receive_count: Option<u32>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_visibility_timeout(VISIBILITY_TIMEOUT_DEFAULT)
    }

    /// `visibility_timeout` is capped at [`VISIBILITY_TIMEOUT_MAX`].
    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            dead_letters: Mutex::new(Vec::new()),
            arrivals: Notify::new(),
            visibility_timeout: visibility_timeout.min(VISIBILITY_TIMEOUT_MAX),
            max_receive_count: None,
        }
    }

    /// Move a message to the dead letters instead of handing it out once it
    /// has been received `max_receive_count` times without being deleted.
    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.max_receive_count = Some(max_receive_count.max(1));
        self
    }

    /// Messages not yet deleted, visible or not.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Messages received but neither deleted nor back to visible.
    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.messages
            .lock()
            .iter()
            .filter(|stored| stored.receipt.is_some() && stored.visible_at > now)
            .count()
    }

    /// Identities moved out by the redrive, oldest first.
    pub fn dead_letters(&self) -> Vec<MessageId> {
        self.dead_letters
            .lock()
            .iter()
            .map(|stored| stored.message_id.clone())
            .collect()
    }

    /// Hand out up to `max_messages` visible messages, or report when the
    /// next hidden one becomes visible.
    fn take_visible(&self, max_messages: usize) -> (Vec<Message>, Option<Instant>) {
        let now = Instant::now();
        let mut messages = self.messages.lock();
        let mut batch = Vec::new();
        let mut next_due: Option<Instant> = None;

        let mut index = 0;
        while index < messages.len() {
            let stored = &mut messages[index];
            if stored.visible_at > now {
                next_due = Some(next_due.map_or(stored.visible_at, |due| due.min(stored.visible_at)));
                index += 1;
                continue;
            }
            if self
                .max_receive_count
                .is_some_and(|max| stored.receive_count >= max)
            {
                let dead = messages.remove(index);
                tracing::warn!(message_id = %dead.message_id, receive_count = dead.receive_count, "moved to dead letters");
                self.dead_letters.lock().push(dead);
                continue;
            }
            index += 1;
            if batch.len() >= max_messages {
                continue;
            }

            let receipt = ReceiptHandle::new(Ulid::new().to_string());
            stored.receipt = Some(receipt.clone());
            stored.visible_at = now + self.visibility_timeout;
            stored.receive_count += 1;
            batch.push(Message {
                body: stored.body.clone(),
                attributes: stored.attributes.clone(),
                receipt_handle: receipt,
                message_id: Some(stored.message_id.clone()),
            });
        }

        (batch, next_due)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(
        &self,
        body: String,
        attributes: Attributes,
        delay_seconds: u64,
    ) -> Result<MessageId, TransportError> {
        let visible_at = Instant::now()
            .checked_add(Duration::from_secs(delay_seconds))
            .ok_or_else(|| {
                TransportError::Send(format!("delay of {delay_seconds}s is out of range"))
            })?;

        let message_id = MessageId::new(Ulid::new().to_string());
        self.messages.lock().push(Stored {
            message_id: message_id.clone(),
            body,
            attributes,
            visible_at,
            receipt: None,
            receive_count: 0,
        });
        self.arrivals.notify_waiters();
        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait_seconds: u64,
    ) -> Result<Vec<Message>, TransportError> {
        if max_messages == 0 {
            return Err(TransportError::Receive(
                "max_messages must be at least 1".to_string(),
            ));
        }

        let deadline = Instant::now()
            .checked_add(Duration::from_secs(wait_seconds))
            .ok_or_else(|| {
                TransportError::Receive(format!("wait of {wait_seconds}s is out of range"))
            })?;
        loop {
            // take_visible より先に登録しておけば、その間の send を取りこぼさない
            let arrived = self.arrivals.notified();
            let (batch, next_due) = self.take_visible(max_messages);
            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(batch);
            }
            let wake_at = next_due.map_or(deadline, |due| due.min(deadline));

            tokio::select! {
                _ = arrived => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<(), TransportError> {
        let mut messages = self.messages.lock();
        let position = messages
            .iter()
            .position(|stored| stored.receipt.as_ref() == Some(receipt_handle))
            .ok_or_else(|| {
                TransportError::Delete(format!("receipt handle is invalid: {receipt_handle}"))
            })?;
        messages.remove(position);
        Ok(())
    }
}
