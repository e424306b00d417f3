//! Queue Driver Contract
//!
//! The only boundary between the listener runtime and a message backend.
//! SQS, RabbitMQ, Redis or the in-memory driver all plug in here.
//!
//! # Contract
//!
//! - `receive_messages` blocks for at most `wait_time` and then returns an
//!   empty `Vec`. An empty result is never an error.
//! - `acknowledge` removes one delivery. A stale receipt handle is reported
//!   as `QueueError::StaleReceipt`; callers treat it as non-fatal.
//! - `reject(requeue = true, delay)` makes the message visible again, after
//!   `delay` when given. `reject(requeue = false, _)` hands the message to
//!   the backend's dead-letter path.
//! - One connected driver is shared by every worker of every listener, so
//!   implementations must accept concurrent calls.

use crate::queue::error::QueueResult;
use crate::queue::message::Message;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Backend-reported queue metadata, keyed by attribute name
pub type QueueAttributes = HashMap<String, Value>;

#[async_trait]
pub trait QueueDriver: Send + Sync {
    /// Acquire backend resources. Called once by the manager before any poll.
    async fn connect(&self) -> QueueResult<()>;

    /// Release backend resources. Called once by the manager after the last worker stops.
    async fn disconnect(&self) -> QueueResult<()>;

    /// Long-poll for up to `max_messages` deliveries
    ///
    /// Returned messages stay hidden from other consumers for
    /// `visibility_timeout` seconds.
    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: u32,
        visibility_timeout: u32,
        wait_time: Duration,
    ) -> QueueResult<Vec<Message>>;

    /// Durably remove a delivery
    async fn acknowledge(&self, message: &Message) -> QueueResult<()>;

    /// Return a delivery to the queue or route it to dead-letter
    ///
    /// `visibility_timeout` is the requeue delay in seconds; `None` requeues immediately.
    async fn reject(
        &self,
        message: &Message,
        requeue: bool,
        visibility_timeout: Option<u32>,
    ) -> QueueResult<()>;

    /// Keep a delivery hidden for `seconds` more from now
    async fn extend_visibility(&self, message: &Message, seconds: u32) -> QueueResult<()>;

    /// Introspection only, never on the dispatch path
    async fn get_queue_attributes(&self, queue_name: &str) -> QueueResult<QueueAttributes>;
}
