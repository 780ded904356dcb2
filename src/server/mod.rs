//! Hub server: listeners, broadcast engine, and lifecycle
//!
//! Two listeners share one subscriber registry:
//!
//! ```text
//!  producers ──TCP──► IngestListener ──► BroadcastEngine ──┐
//!                                                          │ evaluate per
//!                                                          │ subscriber rule
//!  viewers ──WS──► SubscriptionGateway ──► SubscriberRegistry
//!                   (compile rule, register)        │
//!                                                   ▼
//!                                       matching subscribers' sockets
//! ```
//!
//! [`Hub`] ties it together and owns startup and graceful shutdown.

pub mod broadcast;
pub mod config;
pub mod gateway;
pub mod hub;
pub mod ingest;

pub use broadcast::BroadcastEngine;
pub use config::HubConfig;
pub use gateway::{SubscriptionGateway, BAD_RULE_CLOSE_CODE};
pub use hub::Hub;
pub use ingest::IngestListener;
