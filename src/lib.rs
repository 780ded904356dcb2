//! Real-time log fan-out hub
//!
//! Producers push line-delimited JSON log records over plain TCP; viewers
//! subscribe over WebSocket, each with a small filter/highlight rule. Every
//! incoming line is evaluated against every active subscription and
//! delivered, highlighted, only to the matching subscribers.
//!
//! # Quick start
//!
//! ```no_run
//! use loghub::server::{Hub, HubConfig};
//!
//! # async fn example() -> loghub::error::Result<()> {
//! let hub = Hub::new(HubConfig::default());
//! hub.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! A subscription carries its rule in the `rule` query parameter:
//!
//! ```text
//! ws://127.0.0.1:3032/?rule=!level=error@connection
//! ```
//!
//! which delivers every line whose top-level `level` field matches `error`,
//! with each occurrence of `connection` wrapped in a highlight span. A rule
//! that fails to compile closes the connection with application close code
//! 4001 and the compiler's error text as the reason.

pub mod error;
pub mod registry;
pub mod rule;
pub mod server;

pub use error::{Error, Result};
pub use registry::{Subscriber, SubscriberId, SubscriberRegistry};
pub use rule::{CompiledRule, EvalError, RuleError};
pub use server::{BroadcastEngine, Hub, HubConfig};
