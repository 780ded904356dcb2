//! Subscriber registry for rule-driven fan-out
//!
//! The registry is the only state shared between concurrently running tasks:
//! the subscription gateway inserts, peer-close watchers and the broadcast
//! engine remove, and the broadcast engine iterates.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<SubscriberRegistry>
//!                  ┌────────────────────────────┐
//!                  │ subscribers: HashMap<      │
//!                  │   SubscriberId,            │
//!                  │   Arc<Subscriber> {        │
//!                  │     rule: CompiledRule,    │
//!                  │     tx: mpsc::Sender,      │
//!                  │   }                        │
//!                  │ >                          │
//!                  └─────────────┬──────────────┘
//!                                │ snapshot_for_broadcast()
//!                                ▼
//!          [Broadcast Engine] ── evaluate() per subscriber ──► deliver()
//! ```
//!
//! All access goes through the `RwLock`-guarded operations on
//! [`SubscriberRegistry`]; a broadcast works on a snapshot of `Arc` handles
//! so delivery never holds the lock and never observes a half-mutated map.

pub mod error;
pub mod store;
pub mod subscriber;

pub use error::RegistryError;
pub use store::SubscriberRegistry;
pub use subscriber::{DeliveryError, Subscriber, SubscriberId};
