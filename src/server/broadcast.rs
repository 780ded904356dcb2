//! Broadcast engine
//!
//! Couples ingest to delivery: every complete line is evaluated against every
//! active subscriber's rule, and matches are delivered under a bounded
//! deadline. A failing subscriber is torn down without affecting delivery to
//! the rest, and per-subscriber delivery order follows the order lines were
//! read on their ingest connection (broadcast runs synchronously inside the
//! ingest read loop).

use std::sync::Arc;
use std::time::Duration;

use crate::registry::SubscriberRegistry;

/// Fan-out engine over a shared subscriber registry
pub struct BroadcastEngine {
    registry: Arc<SubscriberRegistry>,
    delivery_timeout: Duration,
}

impl BroadcastEngine {
    /// Create an engine over the given registry
    pub fn new(registry: Arc<SubscriberRegistry>, delivery_timeout: Duration) -> Self {
        Self {
            registry,
            delivery_timeout,
        }
    }

    /// The registry this engine fans out over
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Broadcast one ingested line to every matching subscriber
    ///
    /// Evaluation failures skip the subscriber for this line. A delivery
    /// failure or timeout removes exactly that subscriber from the registry;
    /// processing of the remaining subscribers continues.
    pub async fn broadcast(&self, line: &str) {
        let snapshot = self.registry.snapshot_for_broadcast().await;
        if snapshot.is_empty() {
            return;
        }

        tracing::debug!(subscribers = snapshot.len(), "Broadcasting line");

        for subscriber in snapshot {
            let transformed = match subscriber.rule().evaluate(line) {
                Ok(transformed) => transformed,
                Err(reason) => {
                    tracing::trace!(
                        subscriber = %subscriber.id(),
                        reason = %reason,
                        "Line skipped"
                    );
                    continue;
                }
            };

            if let Err(e) = subscriber.deliver(transformed, self.delivery_timeout).await {
                tracing::warn!(
                    subscriber = %subscriber.id(),
                    error = %e,
                    "Delivery failed, removing subscriber"
                );
                self.registry.remove(subscriber.id()).await;
            }
        }
    }
}
