//! Message received from (or sent to) the queue transport.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CourierError;

/// Attribute carrying the delay (seconds) to use for the next redelivery.
pub const NEXT_DELAY_RETRY_ATTR: &str = "NextDelayRetry";

/// Attribute naming the target handler. Absent means the default handler.
pub const METHOD_ATTR: &str = "Method";

/// String-valued message attributes.
pub type Attributes = HashMap<String, String>;

/// Transport-assigned message identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token required to delete a received message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as handed out by the transport on receive.
///
/// The supervisor consumes it exactly once; it is owned by the task that
/// processes it.
#[derive(Debug, Clone)]
pub struct Message {
    pub body: String,
    pub attributes: Attributes,
    pub receipt_handle: ReceiptHandle,
    pub message_id: Option<MessageId>,
}

impl Message {
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            body: body.into(),
            attributes: Attributes::new(),
            receipt_handle: ReceiptHandle::new(receipt_handle),
            message_id: Some(MessageId::new(message_id)),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Handler name from the `Method` attribute ("" when absent).
    pub fn method(&self) -> &str {
        self.attributes
            .get(METHOD_ATTR)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Current backoff delay in seconds (0 when the attribute is absent).
    pub fn next_delay_retry(&self) -> Result<u64, CourierError> {
        match self.attributes.get(NEXT_DELAY_RETRY_ATTR) {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| CourierError::InvalidAttribute {
                    name: NEXT_DELAY_RETRY_ATTR,
                    value: raw.clone(),
                }),
        }
    }
}
