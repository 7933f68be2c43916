use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Point-in-time view of a queue's in-memory bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Message identities with a retry ledger entry.
    pub tracked_failures: usize,
    /// Message identities with continuations waiting.
    pub pending_continuations: usize,
    /// Registered handler names ("" is the default handler).
    pub handlers: Vec<String>,
}

/// Install the global fmt subscriber (`RUST_LOG`, default `info`).
///
/// Safe to call more than once; an already installed subscriber wins.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter);

        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already set");
        }
    });
}
