use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreatedEvent {
    pub id: u64,
    pub sku: String,
}

/// In-process publisher for product events.
///
/// Clones share one broadcast channel. Publishing with no subscriber is not
/// an error, and a subscriber that falls behind loses the oldest events.
#[derive(Clone)]
pub struct ProductEvents {
    tx: broadcast::Sender<ProductCreatedEvent>,
}

impl ProductEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers that will see the event.
    pub fn publish(&self, event: ProductCreatedEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProductCreatedEvent> {
        self.tx.subscribe()
    }

    /// Log every created product until `cancel` fires.
    pub fn spawn_logger(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => tracing::info!(id = event.id, sku = %event.sku, "product created"),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "product event logger lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

impl Default for ProductEvents {
    fn default() -> Self {
        Self::new(256)
    }
}
