//! Listener Configuration
//!
//! The declared settings of one listener: which queue it consumes, how
//! many workers poll it, and how failed jobs are routed.

use crate::listener::error::{ListenerError, ListenerResult};
use serde::{Deserialize, Serialize};

/// Largest batch a single poll may request
pub const MAX_BATCH_SIZE: u32 = 100;

/// Configuration attached to a listener at registration time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    /// Queue to consume from
    pub queue: String,
    /// Number of concurrent worker loops
    pub workers: u32,
    /// Let the manager ack/reject based on the handler result
    pub auto_ack: bool,
    /// Seconds a delivered message stays hidden from other consumers
    pub visibility_timeout: u32,
    /// Batch size requested per poll
    pub max_messages: u32,
    /// Requeue failed messages in auto-ack mode
    pub retry_on_error: bool,
    /// Delivery count at which a failing message is dead-lettered
    pub max_retries: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            queue: String::new(),
            workers: 1,
            auto_ack: true,
            visibility_timeout: 30,
            max_messages: 1,
            retry_on_error: false,
            max_retries: 3,
        }
    }
}

impl ListenerConfig {
    /// Defaults for everything except the queue name
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Self::default()
        }
    }

    pub fn workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    pub fn auto_ack(mut self, auto_ack: bool) -> Self {
        self.auto_ack = auto_ack;
        self
    }

    pub fn visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout = seconds;
        self
    }

    pub fn max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = retry;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check the config for a listener named `listener`
    pub fn validate(&self, listener: &str) -> ListenerResult<()> {
        let invalid = |reason: String| ListenerError::InvalidConfig {
            listener: listener.to_string(),
            reason,
        };

        if self.queue.trim().is_empty() {
            return Err(invalid("queue name must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(invalid("workers must be at least 1".to_string()));
        }
        if self.max_messages == 0 || self.max_messages > MAX_BATCH_SIZE {
            return Err(invalid(format!(
                "max_messages must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.max_messages
            )));
        }
        if self.visibility_timeout == 0 {
            return Err(invalid(
                "visibility_timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}
