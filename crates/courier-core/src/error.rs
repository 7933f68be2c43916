use std::time::Duration;

use thiserror::Error;

use crate::domain::MessageId;

/// Opaque failure returned by user handlers and continuations.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures reported by a queue transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("{0}")]
    Delete(String),
}

#[derive(Debug, Error)]
pub enum CourierError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("timeout processing message from queue after {0:?}")]
    AckTimeout(Duration),

    #[error("handler not found for method={0:?}")]
    HandlerNotFound(String),

    #[error("received message has no message id")]
    MessageIdentityMissing,

    #[error("dropping message {message_id}: it failed {failures} times")]
    RetriesExhausted { message_id: MessageId, failures: u32 },

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("incorrect value of {name}: {value:?}")]
    InvalidAttribute { name: &'static str, value: String },

    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("acknowledgment unit ended without reporting")]
    AckUnitLost,
}

impl From<figment::Error> for CourierError {
    fn from(err: figment::Error) -> Self {
        CourierError::Config(Box::new(err))
    }
}
