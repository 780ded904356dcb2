//! Subscriber registry implementation
//!
//! The central store of active subscribers. Thread-safe via `RwLock`; the
//! broadcast path takes a snapshot of `Arc` handles so delivery I/O never
//! runs under the lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::RegistryError;
use super::subscriber::{Subscriber, SubscriberId};

/// Central registry of active subscribers
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber under its connection id
    ///
    /// Fails if the id is already present; the caller must not register the
    /// same connection twice.
    pub async fn add(&self, subscriber: Subscriber) -> Result<(), RegistryError> {
        let mut subscribers = self.subscribers.write().await;
        let id = subscriber.id();

        if subscribers.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }

        subscribers.insert(id, Arc::new(subscriber));

        tracing::info!(
            subscriber = %id,
            total = subscribers.len(),
            "Subscriber registered"
        );

        Ok(())
    }

    /// Remove a subscriber by id
    ///
    /// Idempotent: removing an absent id is a no-op. Returns the removed
    /// entry when one was present.
    pub async fn remove(&self, id: SubscriberId) -> Option<Arc<Subscriber>> {
        let mut subscribers = self.subscribers.write().await;
        let removed = subscribers.remove(&id);

        if removed.is_some() {
            tracing::info!(
                subscriber = %id,
                total = subscribers.len(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Take a consistent snapshot of all subscribers for one broadcast pass
    ///
    /// The snapshot is a copy of the handles; the lock is released before
    /// the caller evaluates or delivers, so add/remove stay unblocked.
    pub async fn snapshot_for_broadcast(&self) -> Vec<Arc<Subscriber>> {
        let subscribers = self.subscribers.read().await;
        subscribers.values().cloned().collect()
    }

    /// Check whether a subscriber id is currently registered
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }

    /// Number of active subscribers
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Whether the registry holds no subscribers
    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Remove and return every subscriber
    ///
    /// Used at shutdown: dropping the returned handles (and any snapshot
    /// copies) closes each delivery channel, which the writer tasks observe
    /// as the signal to send a normal-closure frame.
    pub async fn drain(&self) -> Vec<Arc<Subscriber>> {
        let mut subscribers = self.subscribers.write().await;
        let drained: Vec<_> = subscribers.drain().map(|(_, sub)| sub).collect();

        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "Registry drained");
        }

        drained
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::sync::mpsc;

    use crate::rule::CompiledRule;

    use super::*;

    fn subscriber(port: u16) -> (Subscriber, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let rule = CompiledRule::compile("!level=error@connection").unwrap();
        (Subscriber::new(SubscriberId::new(addr), rule, tx), rx)
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = SubscriberRegistry::new();
        let (sub, _rx) = subscriber(4000);
        let id = sub.id();

        registry.add(sub).await.unwrap();
        assert!(registry.contains(id).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(id).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_add_fails() {
        let registry = SubscriberRegistry::new();
        let (first, _rx1) = subscriber(4000);
        let (second, _rx2) = subscriber(4000);
        let id = first.id();

        registry.add(first).await.unwrap();
        let result = registry.add(second).await;
        assert_eq!(result, Err(RegistryError::AlreadyRegistered(id)));

        // The original registration is untouched
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let registry = SubscriberRegistry::new();
        let (sub, _rx) = subscriber(4000);
        let id = sub.id();

        assert!(registry.remove(id).await.is_none());
        registry.add(sub).await.unwrap();
        assert!(registry.remove(id).await.is_some());
        assert!(registry.remove(id).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_membership() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = subscriber(4000);
        let (b, _rx_b) = subscriber(4001);
        let id_a = a.id();

        registry.add(a).await.unwrap();
        registry.add(b).await.unwrap();

        let snapshot = registry.snapshot_for_broadcast().await;
        assert_eq!(snapshot.len(), 2);

        registry.remove(id_a).await;
        let snapshot = registry.snapshot_for_broadcast().await;
        assert_eq!(snapshot.len(), 1);
        assert_ne!(snapshot[0].id(), id_a);
    }

    #[tokio::test]
    async fn test_drain_returns_all() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = subscriber(4000);
        let (b, _rx_b) = subscriber(4001);

        registry.add(a).await.unwrap();
        registry.add(b).await.unwrap();

        let drained = registry.drain().await;
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_remove_snapshot() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut handles = Vec::new();

        // Writers: register then unregister distinct ids, many times over
        for task in 0u16..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                for round in 0u16..50 {
                    let (sub, _rx) = subscriber(5000 + task * 100 + (round % 50));
                    let id = sub.id();
                    registry.add(sub).await.unwrap();
                    tokio::task::yield_now().await;
                    registry.remove(id).await;
                }
            }));
        }

        // Readers: snapshots must never observe a broken map
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let snapshot = registry.snapshot_for_broadcast().await;
                    // Every handle in a snapshot is a live, well-formed entry
                    for sub in &snapshot {
                        assert!(!sub.rule().field_key().is_empty());
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(registry.is_empty().await);
    }
}
