//! Type definitions for the queue system

use std::fmt;

/// Final delivery state of one message, as decided by a handler or the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Acknowledged and removed from the queue
    Acked,
    /// Rejected back onto the queue for another delivery
    Requeued,
    /// Rejected to the backend's dead-letter path
    DeadLettered,
}

impl Resolution {
    pub(crate) fn code(self) -> u8 {
        match self {
            Resolution::Acked => 1,
            Resolution::Requeued => 2,
            Resolution::DeadLettered => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Resolution::Acked),
            2 => Some(Resolution::Requeued),
            3 => Some(Resolution::DeadLettered),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Acked => write!(f, "acked"),
            Resolution::Requeued => write!(f, "requeued"),
            Resolution::DeadLettered => write!(f, "dead-lettered"),
        }
    }
}

/// Attribute keys reported by `get_queue_attributes` on the in-memory driver
pub mod attribute_keys {
    pub const QUEUE_NAME: &str = "QueueName";
    pub const VISIBLE: &str = "ApproximateNumberOfMessages";
    pub const NOT_VISIBLE: &str = "ApproximateNumberOfMessagesNotVisible";
    pub const DELAYED: &str = "ApproximateNumberOfMessagesDelayed";
    pub const DEAD_LETTERS: &str = "DeadLetterCount";
}
