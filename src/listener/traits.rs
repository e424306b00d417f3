//! Listener Trait Definition

use crate::listener::context::MessageContext;
use crate::listener::error::{HandlerError, HandlerResult};
use crate::queue::api::Message;
use async_trait::async_trait;

/// A job consumer bound to one queue
///
/// The manager builds one instance per registration and shares it across
/// every worker of that listener, so `handle` may run concurrently on
/// different messages. Keep mutable state behind a lock or atomic.
///
/// Lifecycle:
/// 1. `on_startup` once, after the driver connects and before any poll
/// 2. `handle` once per delivered message
/// 3. `on_error` after a failed `handle` in auto-ack mode
/// 4. `on_shutdown` once, after every worker has stopped
#[async_trait]
pub trait JobListener: Send + Sync {
    /// Process one message
    ///
    /// In auto-ack mode returning `Ok` acknowledges the message and returning
    /// `Err` applies the retry policy. In manual mode the handler resolves the
    /// message itself through `context`.
    async fn handle(&self, message: &Message, context: &MessageContext) -> HandlerResult;

    /// An error from `on_startup` aborts the manager start
    async fn on_startup(&self) -> HandlerResult {
        Ok(())
    }

    /// Errors from `on_shutdown` are logged and otherwise ignored
    async fn on_shutdown(&self) -> HandlerResult {
        Ok(())
    }

    /// Observe a failed `handle`; the message is resolved after this returns
    async fn on_error(&self, _message: &Message, _error: &HandlerError) -> HandlerResult {
        Ok(())
    }
}
