use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::Payload;
use crate::error::{CourierError, HandlerError};

/// A handler for messages routed by method name.
///
/// Returning an error makes the supervisor resend the message with a larger
/// delay. The transport is at-least-once, so handlers must tolerate
/// duplicates.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: Payload) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> Result<(), HandlerError> {
        (self)(payload).await
    }
}

/// Registry of handlers (method name -> handler).
///
/// The empty name is the default handler, used for messages without a
/// `Method` attribute. Registering a name again replaces the previous
/// handler. Registration may happen while a listen loop is running.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        let name = name.into();
        if self.handlers.write().insert(name.clone(), handler).is_some() {
            tracing::debug!(method = %name, "handler replaced");
        }
    }

    /// Look up the handler for a `Method` attribute value.
    pub fn route(&self, method: &str) -> Result<Arc<dyn MessageHandler>, CourierError> {
        self.handlers
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| CourierError::HandlerNotFound(method.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
