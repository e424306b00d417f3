//! Auto-Ack Outcome Policy
//!
//! Pure decision of what the manager does with a message after its
//! handler returns in auto-ack mode.

use crate::listener::config::ListenerConfig;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handler succeeded; remove the message
    Ack,
    /// Handler failed and may try again; requeue immediately
    RequeueRetry,
    /// Handler failed for good; route to dead-letter
    DeadLetter,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ack => write!(f, "ack"),
            Outcome::RequeueRetry => write!(f, "requeue"),
            Outcome::DeadLetter => write!(f, "dead-letter"),
        }
    }
}

/// Decide the outcome for a delivery seen `received_count` times
///
/// A failing message is requeued while retries are enabled and either this
/// is its first delivery or it has been delivered fewer than `max_retries`
/// times. Everything else is dead-lettered.
pub fn decide_outcome(config: &ListenerConfig, received_count: u32, succeeded: bool) -> Outcome {
    if succeeded {
        return Outcome::Ack;
    }
    if config.retry_on_error && (received_count <= 1 || received_count < config.max_retries) {
        Outcome::RequeueRetry
    } else {
        Outcome::DeadLetter
    }
}
