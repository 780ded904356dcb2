//! Subscriber entry and delivery handle
//!
//! A [`Subscriber`] binds one compiled rule to one delivery channel. The
//! registry holds it behind an `Arc`; broadcast snapshots share the same
//! entry read-only, so the rule is evaluated concurrently without copies.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::rule::CompiledRule;

/// Opaque identity of one subscriber connection
///
/// Backed by the peer's remote address, which is unique while the
/// connection is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(SocketAddr);

impl SubscriberId {
    /// Create an id from the connection's remote address
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// The underlying remote address
    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SocketAddr> for SubscriberId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

/// Error type for delivering one line to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber's transport is gone (writer task exited)
    #[error("transport closed")]
    Closed,

    /// The delivery deadline elapsed before the transport accepted the line
    #[error("delivery timed out")]
    Timeout,
}

/// A live delivery target bound to one compiled rule
pub struct Subscriber {
    id: SubscriberId,
    rule: CompiledRule,
    tx: mpsc::Sender<String>,
}

impl Subscriber {
    /// Create a new subscriber entry
    ///
    /// `tx` feeds the connection's writer task; the receiving side owns the
    /// actual socket. Dropping the last handle to this subscriber closes the
    /// channel, which the writer task observes as end-of-stream.
    pub fn new(id: SubscriberId, rule: CompiledRule, tx: mpsc::Sender<String>) -> Self {
        Self { id, rule, tx }
    }

    /// This subscriber's connection identity
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The rule this subscriber filters with
    pub fn rule(&self) -> &CompiledRule {
        &self.rule
    }

    /// Deliver one transformed line, bounded by `deadline`
    ///
    /// A full channel that does not drain within the deadline counts as a
    /// delivery failure, same as a closed transport.
    pub async fn deliver(&self, line: String, deadline: Duration) -> Result<(), DeliveryError> {
        match tokio::time::timeout(deadline, self.tx.send(line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::Timeout),
        }
    }
}
