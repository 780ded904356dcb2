//! Hub configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address the ingest (producer) listener binds to
    pub ingest_addr: SocketAddr,

    /// Address the subscription (WebSocket) listener binds to
    pub subscribe_addr: SocketAddr,

    /// Deadline for delivering one line to one subscriber
    pub delivery_timeout: Duration,

    /// Bound on the whole shutdown sequence; in-flight sends past this
    /// deadline are abandoned
    pub shutdown_timeout: Duration,

    /// Per-subscriber delivery channel capacity
    pub delivery_capacity: usize,

    /// Maximum accepted ingest line length in bytes; `None` (the default)
    /// accepts lines of unbounded length. An oversized line terminates
    /// only its own connection.
    pub max_line_length: Option<usize>,

    /// Enable TCP_NODELAY on accepted connections
    pub tcp_nodelay: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ingest_addr: "127.0.0.1:3031".parse().unwrap(),
            subscribe_addr: "127.0.0.1:3032".parse().unwrap(),
            delivery_timeout: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(1),
            delivery_capacity: 64,
            max_line_length: None,
            tcp_nodelay: true,
        }
    }
}

impl HubConfig {
    /// Set the ingest bind address
    pub fn ingest_addr(mut self, addr: SocketAddr) -> Self {
        self.ingest_addr = addr;
        self
    }

    /// Set the subscription bind address
    pub fn subscribe_addr(mut self, addr: SocketAddr) -> Self {
        self.subscribe_addr = addr;
        self
    }

    /// Set the per-subscriber delivery deadline
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Set the shutdown deadline
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the per-subscriber delivery channel capacity
    pub fn delivery_capacity(mut self, capacity: usize) -> Self {
        self.delivery_capacity = capacity.max(1);
        self
    }

    /// Cap the accepted ingest line length
    pub fn max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = Some(max);
        self
    }
}
