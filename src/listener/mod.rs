//! Job Listener Runtime
//!
//! A listener is a `JobListener` implementation bound to a `ListenerConfig`.
//! The `ListenerManager` connects one queue driver, runs each listener's
//! worker pool against it and resolves every delivered message.
//!
//! # Acknowledgment modes
//!
//! - **auto-ack** (default): the manager acks on `Ok`. On `Err` it calls
//!   `on_error`, then requeues while retries remain or dead-letters.
//! - **manual**: the handler resolves the message through its
//!   `MessageContext`. A message left unresolved is redelivered by the
//!   backend once its visibility timeout expires.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use joblistener::listener::api::*;
//! use joblistener::queue::api::{InMemoryDriver, Message};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct ResizeImage;
//!
//! #[async_trait::async_trait]
//! impl JobListener for ResizeImage {
//!     async fn handle(&self, message: &Message, _context: &MessageContext) -> HandlerResult {
//!         let path = message.get("path").ok_or("missing path")?;
//!         log::info!("Resizing {}", path);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! register_listener(ListenerRegistration::of::<ResizeImage>(
//!     ListenerConfig::new("images").workers(4).retry_on_error(true),
//! ))?;
//!
//! let driver = Arc::new(InMemoryDriver::new());
//! let mut manager = ListenerManager::from_registry(driver)?;
//! manager.run_until_shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod config;
pub(crate) mod context;
pub(crate) mod declare;
pub(crate) mod dependencies;
pub(crate) mod error;
pub(crate) mod manager;
pub(crate) mod outcome;
pub(crate) mod registry;
pub(crate) mod stats;
pub(crate) mod traits;
pub(crate) mod worker;

// Public API module - the only public interface for the listener system
pub mod api;

#[cfg(test)]
mod tests;
