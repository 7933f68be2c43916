use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};

use courier_core::{
    CourierError, HandlerError, InMemoryTransport, MessageHandler, Payload, Queue, QueueConfig,
    Transport, init_tracing,
};

#[derive(Debug, Deserialize)]
struct Invoice {
    customer: String,
    amount: u64,
}

/// 指定回数だけわざと失敗する handler（再送の様子を見るため）
struct BillingHandler {
    remaining_failures: AtomicU32,
}

impl BillingHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl MessageHandler for BillingHandler {
    async fn handle(&self, payload: Payload) -> Result<(), HandlerError> {
        let invoice: Invoice = payload.decode_as()?;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(format!("intentional failure (left={left})").into());
        }

        println!("billed {} for {}", invoice.customer, invoice.amount);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), CourierError> {
    init_tracing();

    // (A) 設定: courier.toml と COURIER_* 環境変数。読めなければ既定値
    let config = QueueConfig::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "config load failed, using defaults");
        QueueConfig::new("memory://demo")
    });
    let config = QueueConfig {
        wait_seconds: 1,
        ..config
    };

    // (B) Queue と handler を用意
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let queue = Queue::new(transport, config)?;

    queue.register("", |payload: Payload| async move {
        println!("default handler got: {}", serde_json::to_string(&payload)?);
        Ok::<(), HandlerError>(())
    });
    queue.register("billing", BillingHandler::new(2));

    // (C) 送信。then は同じ identity の handler 成功後に一度だけ呼ばれる。
    // 再送は新しい identity になるので、失敗した billing には then を付けない
    queue
        .put_string("", "plain text body", 0)
        .await?
        .then(|payload: Payload| async move {
            println!("then: processed {}", serde_json::to_string(&payload)?);
            Ok::<(), HandlerError>(())
        });
    queue
        .put_json(
            "billing",
            &serde_json::json!({ "customer": "acme", "amount": 42 }),
            0,
        )
        .await?;

    // (D) listen ループを起動
    let listener = queue.spawn_listener();

    // (E) 2 回失敗 → 再送 (1s, 2s 遅延) → 成功 までを待つ
    sleep(Duration::from_secs(6)).await;

    let stats = serde_json::to_string_pretty(&queue.stats())?;
    println!("stats: {stats}");

    listener.shutdown_and_join().await;
    Ok(())
}
