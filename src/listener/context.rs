//! Message Context
//!
//! Per-delivery handle given to a handler alongside its message. It binds
//! the message to the driver it came from so that manual-ack handlers can
//! resolve it, and carries the dependencies resolved for this dispatch.
//!
//! A delivery is resolved at most once. The first successful `ack` or
//! `reject` claims it; every later attempt fails with
//! `QueueError::AlreadyResolved` without reaching the driver.

use crate::listener::dependencies::Dependencies;
use crate::queue::api::{Message, QueueDriver, QueueError, QueueResult, Resolution};
use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const UNRESOLVED: u8 = 0;

pub struct MessageContext {
    message: Arc<Message>,
    driver: Arc<dyn QueueDriver>,
    queue_name: String,
    resolution: AtomicU8,
    dependencies: Dependencies,
}

impl std::fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageContext")
            .field("message_id", &self.message.id())
            .field("queue_name", &self.queue_name)
            .field("resolution", &self.resolution())
            .finish()
    }
}

impl MessageContext {
    pub fn new(
        message: Arc<Message>,
        driver: Arc<dyn QueueDriver>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            message,
            driver,
            queue_name: queue_name.into(),
            resolution: AtomicU8::new(UNRESOLVED),
            dependencies: Dependencies::default(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Service of type `T` resolved for this dispatch, if any
    pub fn dependency<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.dependencies.get::<T>()
    }

    /// How this delivery was resolved, `None` while still outstanding
    pub fn resolution(&self) -> Option<Resolution> {
        Resolution::from_code(self.resolution.load(Ordering::Acquire))
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution().is_some()
    }

    /// Acknowledge the message, removing it from the queue
    pub async fn ack(&self) -> QueueResult<()> {
        self.claim(Resolution::Acked)?;
        let result = self.driver.acknowledge(&self.message).await;
        self.settle(result)
    }

    /// Reject the message
    ///
    /// With `requeue` the message becomes visible again after
    /// `visibility_timeout` seconds (immediately when `None`). Without it
    /// the message goes to the backend's dead-letter path.
    pub async fn reject(&self, requeue: bool, visibility_timeout: Option<u32>) -> QueueResult<()> {
        let resolution = if requeue {
            Resolution::Requeued
        } else {
            Resolution::DeadLettered
        };
        self.claim(resolution)?;
        let result = self
            .driver
            .reject(&self.message, requeue, visibility_timeout)
            .await;
        self.settle(result)
    }

    /// Keep the message hidden for `seconds` more, for long-running handlers
    pub async fn extend_visibility(&self, seconds: u32) -> QueueResult<()> {
        if let Some(resolution) = self.resolution() {
            return Err(self.already_resolved(resolution));
        }
        self.driver.extend_visibility(&self.message, seconds).await
    }

    fn claim(&self, resolution: Resolution) -> QueueResult<()> {
        match self.resolution.compare_exchange(
            UNRESOLVED,
            resolution.code(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => match Resolution::from_code(current) {
                Some(existing) => Err(self.already_resolved(existing)),
                None => Err(self.already_resolved(resolution)),
            },
        }
    }

    // A failed driver call leaves the delivery outstanding
    fn settle(&self, result: QueueResult<()>) -> QueueResult<()> {
        if result.is_err() {
            self.resolution.store(UNRESOLVED, Ordering::Release);
        }
        result
    }

    fn already_resolved(&self, resolution: Resolution) -> QueueError {
        QueueError::AlreadyResolved {
            message_id: self.message.id().to_string(),
            resolution,
        }
    }
}
