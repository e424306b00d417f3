//! Queue job listener runtime
//!
//! Consume messages from a pull-based queue through a pluggable
//! `QueueDriver`, dispatch them to `JobListener` handlers under per-listener
//! worker pools and resolve every delivery by ack, requeue or dead-letter.

pub mod core;
pub mod listener;
pub mod queue;
pub mod settings;

#[doc(hidden)]
pub use inventory as __inventory;
