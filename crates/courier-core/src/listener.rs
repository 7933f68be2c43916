use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::queue::Queue;

/// Running listen loop handle.
/// - `request_shutdown()` でポーリングを止める（処理中のメッセージは走り切る）
/// - `shutdown_and_join()` で listen ループの終了を待てる
pub struct Listener {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Queue {
    /// Spawn `listen_forever` on the runtime.
    pub fn spawn_listener(&self) -> Listener {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queue = self.clone();
        let join = tokio::spawn(async move {
            queue.listen_forever(shutdown_rx).await;
        });

        Listener { shutdown_tx, join }
    }
}

impl Listener {
    /// Stop taking new messages.
    /// In-flight acknowledgment work is not cancelled.
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Shutdown and wait for the listen loop.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "listener task failed");
        }
    }
}
