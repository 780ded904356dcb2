//! The hub: both listeners plus the shared registry and engine
//!
//! Owns process-scoped state (registry, broadcast engine) and the lifecycle
//! of both listeners. Shutdown follows a fixed sequence: stop accepting,
//! close every active subscriber with a normal-closure frame, release the
//! listeners; the whole sequence is bounded by the configured timeout and
//! in-flight sends past the deadline are abandoned.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::Result;
use crate::registry::SubscriberRegistry;

use super::broadcast::BroadcastEngine;
use super::config::HubConfig;
use super::gateway::SubscriptionGateway;
use super::ingest::IngestListener;

/// Log fan-out hub
pub struct Hub {
    config: HubConfig,
    registry: Arc<SubscriberRegistry>,
    engine: Arc<BroadcastEngine>,
}

impl Hub {
    /// Create a hub with the given configuration
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&registry),
            config.delivery_timeout,
        ));

        Self {
            config,
            registry,
            engine,
        }
    }

    /// The shared subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Run the hub until the process is killed
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the hub with graceful shutdown
    ///
    /// Returns once `shutdown` resolves and the teardown sequence has
    /// completed (or its deadline elapsed).
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let ingest_listener = TcpListener::bind(self.config.ingest_addr).await?;
        let subscribe_listener = TcpListener::bind(self.config.subscribe_addr).await?;

        tracing::info!(
            ingest = %ingest_listener.local_addr()?,
            subscriptions = %subscribe_listener.local_addr()?,
            "Log hub listening"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let ingest = IngestListener::new(
            Arc::clone(&self.engine),
            self.config.tcp_nodelay,
            self.config.max_line_length,
        );
        let gateway = SubscriptionGateway::new(
            Arc::clone(&self.registry),
            self.config.delivery_capacity,
            self.config.tcp_nodelay,
        );

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = ingest.run(ingest_listener, stop_rx.clone()) => {}
            _ = gateway.run(subscribe_listener, stop_rx.clone()) => {}
        }

        // Dropping the select arms closed both listeners; now stop the
        // per-connection tasks and close the subscribers.
        if stop_tx.send(true).is_err() {
            tracing::debug!("No connection tasks to stop");
        }

        self.shutdown(&gateway).await;
        Ok(())
    }

    /// Bind addresses currently configured
    pub fn addrs(&self) -> (SocketAddr, SocketAddr) {
        (self.config.ingest_addr, self.config.subscribe_addr)
    }

    async fn shutdown(&self, gateway: &SubscriptionGateway) {
        // Dropping the registry's handles closes every delivery channel;
        // each connection task answers with a normal-closure frame.
        let subscribers = self.registry.drain().await;
        drop(subscribers);

        let deadline = self.config.shutdown_timeout;
        if tokio::time::timeout(deadline, gateway.join_connections())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_ms = deadline.as_millis() as u64,
                "Shutdown deadline elapsed, abandoning in-flight sends"
            );
            gateway.abort_connections().await;
        }

        tracing::info!("Log hub stopped");
    }
}
