//! Listen loop: poll the transport, route, hand each message to the
//! supervisor on its own task.

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

use super::Queue;
use crate::error::CourierError;

impl Queue {
    /// Poll and dispatch until `shutdown` turns true (or its sender is gone).
    ///
    /// Fatal: receive errors and messages without a matching handler.
    /// Per-message supervisor failures are logged and the loop goes on; the
    /// queue's own redelivery covers them.
    #[instrument(skip_all, fields(queue_url = %self.config.queue_url))]
    pub async fn listen(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), CourierError> {
        info!("starting the listen process");
        let mut in_flight = JoinSet::new();
        let result = self.poll(shutdown, &mut in_flight).await;
        // Messages already handed out finish on their own.
        in_flight.detach_all();
        result
    }

    /// `listen`, restarted after the configured cool-down whenever it fails.
    pub async fn listen_forever(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let Err(err) = self.listen(&mut shutdown).await else {
                return;
            };

            let cooldown = self.config.listen_cooldown();
            error!(error = %err, ?cooldown, "listen terminated, retry to listen... wait");
            tokio::select! {
                _ = tokio::time::sleep(cooldown) => {}
                // shutdown の判定は次の listen の先頭で行う
                _ = shutdown.changed() => {}
            }
        }
    }

    async fn poll(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        in_flight: &mut JoinSet<()>,
    ) -> Result<(), CourierError> {
        loop {
            reap(in_flight);
            if *shutdown.borrow() {
                return Ok(());
            }

            // receive は long poll なので shutdown と競合させる
            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    continue;
                }
                received = self.transport.receive(self.config.batch_size, self.config.wait_seconds) => received,
            };

            let batch = received.inspect_err(|err| error!(error = %err, "receive message error"))?;

            for message in batch {
                let handler = self.route(&message)?;
                let queue = self.clone();
                in_flight.spawn(async move {
                    let message_id = message.message_id.clone();
                    if let Err(err) = queue.handle_message(handler, message).await {
                        error!(?message_id, error = %err, "handling queue message");
                    }
                });
            }
        }
    }
}

fn reap(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.try_join_next() {
        if let Err(err) = joined {
            error!(error = %err, "message task panicked");
        }
    }
}
