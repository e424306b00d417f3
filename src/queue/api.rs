//! Public API for the queue system
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Driver contract
pub use crate::queue::driver::{QueueAttributes, QueueDriver};

// Message types
pub use crate::queue::message::{Message, MessageBody, MessageBuilder};
pub use crate::queue::types::{attribute_keys, Resolution};

// In-process backend
pub use crate::queue::memory::{InMemoryDriver, QUEUE_NAME_ATTRIBUTE};

// Error handling
pub use crate::queue::error::{QueueError, QueueResult};
