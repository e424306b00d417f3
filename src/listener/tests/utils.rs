//! Test doubles shared by the listener tests

use crate::listener::api::{
    HandlerError, HandlerResult, JobListener, ListenerConfig, ListenerRegistration,
    ManagerConfig, MessageContext,
};
use crate::queue::api::{Message, QueueAttributes, QueueDriver, QueueError, QueueResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// One call observed by `RecordingDriver`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DriverCall {
    Connect,
    Disconnect,
    Ack {
        id: String,
    },
    Reject {
        id: String,
        requeue: bool,
        visibility_timeout: Option<u32>,
    },
    Extend {
        id: String,
        seconds: u32,
    },
}

/// Driver that replays scripted batches and records every outcome call
#[derive(Debug, Default)]
pub struct RecordingDriver {
    batches: Mutex<HashMap<String, VecDeque<QueueResult<Vec<Message>>>>>,
    calls: Mutex<Vec<DriverCall>>,
    polls: AtomicUsize,
    fail_connect: AtomicBool,
    fail_acks: AtomicBool,
    panic_polls: AtomicBool,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a batch to be returned by the next poll of `queue`
    pub fn push_batch(&self, queue: &str, messages: Vec<Message>) {
        self.batches
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(Ok(messages));
    }

    /// Make the next poll of `queue` fail
    pub fn push_poll_error(&self, queue: &str) {
        self.batches
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(Err(QueueError::ReceiveFailed {
                queue: queue.to_string(),
                message: "backend hiccup".to_string(),
            }));
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_acks(&self) {
        self.fail_acks.store(true, Ordering::SeqCst);
    }

    /// Make every poll panic, killing the calling worker task
    pub fn panic_on_poll(&self) {
        self.panic_polls.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Ack and reject calls only
    pub fn resolutions(&self) -> Vec<DriverCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, DriverCall::Ack { .. } | DriverCall::Reject { .. }))
            .collect()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueDriver for RecordingDriver {
    async fn connect(&self) -> QueueResult<()> {
        self.record(DriverCall::Connect);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(QueueError::ConnectionFailed {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> QueueResult<()> {
        self.record(DriverCall::Disconnect);
        Ok(())
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        _max_messages: u32,
        _visibility_timeout: u32,
        wait_time: Duration,
    ) -> QueueResult<Vec<Message>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.panic_polls.load(Ordering::SeqCst) {
            panic!("driver poll exploded");
        }
        let next = self
            .batches
            .lock()
            .unwrap()
            .get_mut(queue_name)
            .and_then(|batches| batches.pop_front());
        match next {
            Some(result) => result,
            None => {
                tokio::time::sleep(wait_time).await;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&self, message: &Message) -> QueueResult<()> {
        self.record(DriverCall::Ack {
            id: message.id().to_string(),
        });
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(QueueError::StaleReceipt {
                message_id: message.id().to_string(),
            });
        }
        Ok(())
    }

    async fn reject(
        &self,
        message: &Message,
        requeue: bool,
        visibility_timeout: Option<u32>,
    ) -> QueueResult<()> {
        self.record(DriverCall::Reject {
            id: message.id().to_string(),
            requeue,
            visibility_timeout,
        });
        Ok(())
    }

    async fn extend_visibility(&self, message: &Message, seconds: u32) -> QueueResult<()> {
        self.record(DriverCall::Extend {
            id: message.id().to_string(),
            seconds,
        });
        Ok(())
    }

    async fn get_queue_attributes(&self, _queue_name: &str) -> QueueResult<QueueAttributes> {
        Ok(QueueAttributes::new())
    }
}

/// What a `ScriptedListener` does with each message
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail(&'static str),
    Panic,
    Ack,
    Reject {
        requeue: bool,
        visibility_timeout: Option<u32>,
    },
    ExtendThenAck(u32),
    AckThenFail,
    Ignore,
    /// Wait until every party of the barrier is inside `handle`
    Rendezvous(Arc<Barrier>),
    Sleep(Duration),
}

/// Listener that follows a `Behavior` and records what the manager did to it
pub struct ScriptedListener {
    behavior: Behavior,
    handled: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, String)>>,
    startups: AtomicUsize,
    shutdowns: AtomicUsize,
    fail_startup: AtomicBool,
}

impl ScriptedListener {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            handled: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            startups: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            fail_startup: AtomicBool::new(false),
        })
    }

    pub fn failing_startup(behavior: Behavior) -> Arc<Self> {
        let listener = Self::new(behavior);
        listener.fail_startup.store(true, Ordering::SeqCst);
        listener
    }

    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }

    /// `(message id, error text)` per `on_error` call
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn startups(&self) -> usize {
        self.startups.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn registration(
        self: &Arc<Self>,
        name: &str,
        config: ListenerConfig,
    ) -> ListenerRegistration {
        ListenerRegistration::with_instance(name, config, Arc::clone(self) as Arc<dyn JobListener>)
    }
}

#[async_trait]
impl JobListener for ScriptedListener {
    async fn handle(&self, message: &Message, context: &MessageContext) -> HandlerResult {
        self.handled.lock().unwrap().push(message.id().to_string());
        match &self.behavior {
            Behavior::Succeed | Behavior::Ignore => Ok(()),
            Behavior::Fail(reason) => Err((*reason).into()),
            Behavior::Panic => panic!("handler exploded"),
            Behavior::Ack => Ok(context.ack().await?),
            Behavior::Reject {
                requeue,
                visibility_timeout,
            } => Ok(context.reject(*requeue, *visibility_timeout).await?),
            Behavior::ExtendThenAck(seconds) => {
                context.extend_visibility(*seconds).await?;
                Ok(context.ack().await?)
            }
            Behavior::AckThenFail => {
                context.ack().await?;
                Err("failed after ack".into())
            }
            Behavior::Rendezvous(barrier) => {
                tokio::time::timeout(Duration::from_secs(5), barrier.wait())
                    .await
                    .map_err(|_| "workers did not run concurrently")?;
                Ok(())
            }
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }

    async fn on_startup(&self) -> HandlerResult {
        self.startups.fetch_add(1, Ordering::SeqCst);
        if self.fail_startup.load(Ordering::SeqCst) {
            return Err("startup refused".into());
        }
        Ok(())
    }

    async fn on_shutdown(&self) -> HandlerResult {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_error(&self, message: &Message, error: &HandlerError) -> HandlerResult {
        self.errors
            .lock()
            .unwrap()
            .push((message.id().to_string(), error.to_string()));
        Ok(())
    }
}

/// Short polls so tests spin quickly
pub fn fast_config() -> ManagerConfig {
    ManagerConfig::default()
        .wait_time(Duration::from_millis(10))
        .shutdown_timeout(Duration::from_secs(2))
}

pub fn message(id: &str, received_count: u32) -> Message {
    Message::builder(id)
        .field("job", id)
        .received_count(received_count)
        .build()
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
