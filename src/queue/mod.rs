//! Queue Backend Boundary
//!
//! Everything the listener runtime knows about message queues: the
//! `QueueDriver` contract, the read-only `Message` delivered through it,
//! and an in-process driver implementation.
//!
//! # Delivery lifecycle
//!
//! ```text
//!   send ──► ready ──receive──► in flight ──acknowledge──► (gone)
//!              ▲                    │
//!              │   requeue / expiry │ reject(requeue = false)
//!              └────────────────────┤
//!                                   ▼
//!                              dead letter
//! ```
//!
//! A delivery is hidden from other consumers while in flight. If nobody
//! resolves it before its visibility timeout, it returns to `ready` with
//! `received_count` incremented on the next delivery.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use joblistener::queue::api::{InMemoryDriver, QueueDriver};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = InMemoryDriver::new();
//! driver.connect().await?;
//!
//! let mut body = serde_json::Map::new();
//! body.insert("to".to_string(), "user@example.com".into());
//! driver.send("emails", body)?;
//!
//! for message in driver
//!     .receive_messages("emails", 10, 30, Duration::from_secs(1))
//!     .await?
//! {
//!     println!("Received {}: {:?}", message.id(), message.body());
//!     driver.acknowledge(&message).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub(crate) mod driver;
pub(crate) mod error;
pub(crate) mod memory;
pub(crate) mod message;
pub(crate) mod types;

// Public API module - the only public interface for the queue system
pub mod api;

#[cfg(test)]
mod tests;
