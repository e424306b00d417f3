//! In-process queue backend
//!
//! `InMemoryDriver` implements the full driver contract against process
//! memory: visibility timeouts, per-delivery receipt handles, delayed
//! requeue, dead-letter lists and long polling. It backs the test suites
//! and works for single-process deployments that want a local job queue.
//!
//! Time is read from `tokio::time`, so tests can run it under a paused clock.

use crate::core::sync::handle_mutex_poison;
use crate::core::time::deadline_after;
use crate::queue::driver::{QueueAttributes, QueueDriver};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::{Message, MessageBody};
use crate::queue::types::attribute_keys;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Attribute every delivered message carries with its source queue
pub const QUEUE_NAME_ATTRIBUTE: &str = "queue_name";

/// Stored form of a logical message, independent of any delivery
#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: MessageBody,
    attributes: HashMap<String, String>,
    received_count: u32,
    sent_at: DateTime<Utc>,
}

#[derive(Debug)]
struct InFlight {
    message: StoredMessage,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct MemoryQueue {
    ready: VecDeque<StoredMessage>,
    delayed: Vec<(Instant, StoredMessage)>,
    in_flight: HashMap<String, InFlight>,
    dead_letters: Vec<Message>,
}

impl MemoryQueue {
    /// Move expired deliveries and due delayed messages back to `ready`
    fn reclaim(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();
        for handle in expired {
            if let Some(entry) = self.in_flight.remove(&handle) {
                log::trace!(
                    "Visibility timeout expired for message {}, returning to queue",
                    entry.message.id
                );
                self.ready.push_back(entry.message);
            }
        }

        if !self.delayed.is_empty() {
            let (due, pending): (Vec<_>, Vec<_>) =
                self.delayed.drain(..).partition(|(at, _)| *at <= now);
            self.delayed = pending;
            self.ready.extend(due.into_iter().map(|(_, message)| message));
        }
    }

    /// Earliest instant at which something becomes visible again
    fn next_wake(&self) -> Option<Instant> {
        let in_flight = self.in_flight.values().map(|entry| entry.visible_at);
        let delayed = self.delayed.iter().map(|(at, _)| *at);
        in_flight.chain(delayed).min()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    queues: HashMap<String, MemoryQueue>,
}

/// Queue driver backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryDriver {
    state: Mutex<MemoryState>,
    notify: Notify,
    connected: AtomicBool,
    fail_next_connect: AtomicBool,
    next_message_id: AtomicU64,
    next_receipt: AtomicU64,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> QueueResult<MutexGuard<'_, MemoryState>> {
        handle_mutex_poison(self.state.lock(), |message| QueueError::OperationFailed {
            operation: "lock".to_string(),
            message_id: String::new(),
            message,
        })
    }

    fn ensure_connected(&self) -> QueueResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(QueueError::NotConnected)
        }
    }

    /// Enqueue a job. Queues are created on first use; sending does not
    /// require a connection so producers can preload work.
    pub fn send(&self, queue_name: &str, body: MessageBody) -> QueueResult<String> {
        self.send_with_attributes(queue_name, body, HashMap::new())
    }

    pub fn send_with_attributes(
        &self,
        queue_name: &str,
        body: MessageBody,
        attributes: HashMap<String, String>,
    ) -> QueueResult<String> {
        let sequence = self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{}-{}", queue_name, sequence);
        self.send_with_id(queue_name, &id, body, attributes)?;
        Ok(id)
    }

    /// Enqueue a job under a caller-chosen id
    pub fn send_with_id(
        &self,
        queue_name: &str,
        id: &str,
        body: MessageBody,
        attributes: HashMap<String, String>,
    ) -> QueueResult<()> {
        {
            let mut state = self.lock_state()?;
            let queue = state.queues.entry(queue_name.to_string()).or_default();
            queue.ready.push_back(StoredMessage {
                id: id.to_string(),
                body,
                attributes,
                received_count: 0,
                sent_at: Utc::now(),
            });
        }
        log::trace!("Message {} sent to in-memory queue '{}'", id, queue_name);
        self.notify.notify_waiters();
        Ok(())
    }

    /// Messages rejected without requeue, oldest first
    pub fn dead_letters(&self, queue_name: &str) -> Vec<Message> {
        self.lock_state()
            .map(|state| {
                state
                    .queues
                    .get(queue_name)
                    .map(|queue| queue.dead_letters.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Messages waiting for delivery, including delayed ones
    pub fn pending_count(&self, queue_name: &str) -> usize {
        let now = Instant::now();
        self.lock_state()
            .map(|mut state| {
                state
                    .queues
                    .get_mut(queue_name)
                    .map(|queue| {
                        queue.reclaim(now);
                        queue.ready.len() + queue.delayed.len()
                    })
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Deliveries currently hidden behind a visibility timeout
    pub fn in_flight_count(&self, queue_name: &str) -> usize {
        let now = Instant::now();
        self.lock_state()
            .map(|mut state| {
                state
                    .queues
                    .get_mut(queue_name)
                    .map(|queue| {
                        queue.reclaim(now);
                        queue.in_flight.len()
                    })
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Make the next `connect` call fail with `ConnectionFailed`
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::Release);
    }

    fn next_receipt_handle(&self, message_id: &str) -> String {
        let sequence = self.next_receipt.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}#{}", message_id, sequence)
    }

    /// Remove the in-flight entry for `message`, failing on stale handles
    fn take_in_flight(&self, message: &Message) -> QueueResult<(String, StoredMessage)> {
        let now = Instant::now();
        let mut state = self.lock_state()?;
        for (name, queue) in state.queues.iter_mut() {
            queue.reclaim(now);
            if let Some(entry) = queue.in_flight.remove(message.receipt_handle()) {
                return Ok((name.clone(), entry.message));
            }
        }
        Err(QueueError::StaleReceipt {
            message_id: message.id().to_string(),
        })
    }
}

#[async_trait]
impl QueueDriver for InMemoryDriver {
    async fn connect(&self) -> QueueResult<()> {
        if self.fail_next_connect.swap(false, Ordering::AcqRel) {
            return Err(QueueError::ConnectionFailed {
                message: "in-memory backend configured to refuse connection".to_string(),
            });
        }
        self.connected.store(true, Ordering::Release);
        log::debug!("In-memory queue driver connected");
        Ok(())
    }

    async fn disconnect(&self) -> QueueResult<()> {
        self.connected.store(false, Ordering::Release);
        self.notify.notify_waiters();
        log::debug!("In-memory queue driver disconnected");
        Ok(())
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: u32,
        visibility_timeout: u32,
        wait_time: Duration,
    ) -> QueueResult<Vec<Message>> {
        let deadline = deadline_after(wait_time);
        let max_messages = max_messages.max(1) as usize;

        loop {
            self.ensure_connected()?;

            // Register interest before inspecting the queue so a send between
            // the check and the await still wakes us
            let notified = self.notify.notified();

            let next_wake = {
                let now = Instant::now();
                let mut state = self.lock_state()?;
                let queue = state.queues.entry(queue_name.to_string()).or_default();
                queue.reclaim(now);

                let mut delivered = Vec::new();
                while delivered.len() < max_messages {
                    let Some(mut stored) = queue.ready.pop_front() else {
                        break;
                    };
                    stored.received_count += 1;

                    let receipt_handle = self.next_receipt_handle(&stored.id);
                    let mut attributes = stored.attributes.clone();
                    attributes.insert(QUEUE_NAME_ATTRIBUTE.to_string(), queue_name.to_string());

                    delivered.push(Message::new(
                        stored.id.clone(),
                        stored.body.clone(),
                        attributes,
                        receipt_handle.clone(),
                        stored.received_count,
                        stored.sent_at,
                    ));
                    queue.in_flight.insert(
                        receipt_handle,
                        InFlight {
                            message: stored,
                            visible_at: now + Duration::from_secs(u64::from(visibility_timeout)),
                        },
                    );
                }

                if !delivered.is_empty() {
                    log::trace!(
                        "Delivered {} message(s) from in-memory queue '{}'",
                        delivered.len(),
                        queue_name
                    );
                    return Ok(delivered);
                }
                if now >= deadline {
                    return Ok(Vec::new());
                }
                queue
                    .next_wake()
                    .map_or(deadline, |at| at.min(deadline))
            };

            let _ = tokio::time::timeout_at(next_wake, notified).await;
        }
    }

    async fn acknowledge(&self, message: &Message) -> QueueResult<()> {
        self.ensure_connected()?;
        let (queue_name, stored) = self.take_in_flight(message)?;
        log::trace!("Message {} acknowledged on '{}'", stored.id, queue_name);
        Ok(())
    }

    async fn reject(
        &self,
        message: &Message,
        requeue: bool,
        visibility_timeout: Option<u32>,
    ) -> QueueResult<()> {
        self.ensure_connected()?;
        let (queue_name, stored) = self.take_in_flight(message)?;

        {
            let mut state = self.lock_state()?;
            let queue = state.queues.entry(queue_name.clone()).or_default();
            match (requeue, visibility_timeout) {
                (true, Some(delay)) if delay > 0 => {
                    let at = Instant::now() + Duration::from_secs(u64::from(delay));
                    queue.delayed.push((at, stored));
                }
                (true, _) => queue.ready.push_back(stored),
                (false, _) => queue.dead_letters.push(message.clone()),
            }
        }

        log::trace!(
            "Message {} rejected on '{}' (requeue: {})",
            message.id(),
            queue_name,
            requeue
        );
        self.notify.notify_waiters();
        Ok(())
    }

    async fn extend_visibility(&self, message: &Message, seconds: u32) -> QueueResult<()> {
        self.ensure_connected()?;
        let now = Instant::now();
        let mut state = self.lock_state()?;
        for queue in state.queues.values_mut() {
            queue.reclaim(now);
            if let Some(entry) = queue.in_flight.get_mut(message.receipt_handle()) {
                entry.visible_at = now + Duration::from_secs(u64::from(seconds));
                return Ok(());
            }
        }
        Err(QueueError::StaleReceipt {
            message_id: message.id().to_string(),
        })
    }

    async fn get_queue_attributes(&self, queue_name: &str) -> QueueResult<QueueAttributes> {
        self.ensure_connected()?;
        let now = Instant::now();
        let mut state = self.lock_state()?;
        let queue = state
            .queues
            .get_mut(queue_name)
            .ok_or_else(|| QueueError::QueueNotFound {
                queue: queue_name.to_string(),
            })?;
        queue.reclaim(now);

        let mut attributes = QueueAttributes::new();
        attributes.insert(attribute_keys::QUEUE_NAME.to_string(), queue_name.into());
        attributes.insert(attribute_keys::VISIBLE.to_string(), queue.ready.len().into());
        attributes.insert(
            attribute_keys::NOT_VISIBLE.to_string(),
            queue.in_flight.len().into(),
        );
        attributes.insert(attribute_keys::DELAYED.to_string(), queue.delayed.len().into());
        attributes.insert(
            attribute_keys::DEAD_LETTERS.to_string(),
            queue.dead_letters.len().into(),
        );
        Ok(attributes)
    }
}
