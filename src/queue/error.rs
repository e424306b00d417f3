//! Queue Error Types

use crate::queue::types::Resolution;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to connect to queue backend: {message}")]
    ConnectionFailed { message: String },

    #[error("Queue driver is not connected")]
    NotConnected,

    #[error("Queue not found: {queue}")]
    QueueNotFound { queue: String },

    #[error("Failed to receive messages from '{queue}': {message}")]
    ReceiveFailed { queue: String, message: String },

    #[error("Receipt handle for message {message_id} is stale or unknown")]
    StaleReceipt { message_id: String },

    #[error("Message {message_id} was already resolved ({resolution})")]
    AlreadyResolved {
        message_id: String,
        resolution: Resolution,
    },

    #[error("Operation '{operation}' failed for message {message_id}: {message}")]
    OperationFailed {
        operation: String,
        message_id: String,
        message: String,
    },
}

impl QueueError {
    /// True for errors that mean "this delivery is no longer ours"
    pub fn is_stale(&self) -> bool {
        matches!(self, QueueError::StaleReceipt { .. })
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
