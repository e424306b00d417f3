//! Worker Loop
//!
//! One worker polls one queue for one listener and processes its batch
//! strictly in order. A listener with `workers = N` gets N of these.
//!
//! Per-message failures never leave this module: handler errors, panics,
//! dependency failures and ack/reject errors are all logged and counted.
//! Only a shutdown request ends the loop.

use crate::core::retry::{Backoff, BackoffPolicy};
use crate::core::shutdown::ShutdownCoordinator;
use crate::listener::config::ListenerConfig;
use crate::listener::context::MessageContext;
use crate::listener::dependencies::DependencyProvider;
use crate::listener::error::{
    DependencyResolutionFailed, HandlerError, HandlerPanicked, HandlerResult,
};
use crate::listener::outcome::{decide_outcome, Outcome};
use crate::listener::stats::ListenerStats;
use crate::listener::traits::JobListener;
use crate::queue::api::{Message, QueueDriver, QueueResult, Resolution};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Pause between empty short polls (`wait_time = 0`)
const SHORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) struct Worker {
    pub(crate) listener_name: String,
    pub(crate) worker_id: u32,
    pub(crate) config: ListenerConfig,
    pub(crate) listener: Arc<dyn JobListener>,
    pub(crate) driver: Arc<dyn QueueDriver>,
    pub(crate) dependencies: Arc<dyn DependencyProvider>,
    pub(crate) stats: Arc<ListenerStats>,
    pub(crate) wait_time: Duration,
    pub(crate) poll_backoff: BackoffPolicy,
    pub(crate) release_unprocessed: bool,
    pub(crate) shutdown: ShutdownCoordinator,
}

impl Worker {
    pub(crate) async fn run(self) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut backoff = Backoff::new(self.poll_backoff.clone());

        log::debug!(
            "Worker {}#{} polling '{}'",
            self.listener_name,
            self.worker_id,
            self.config.queue
        );

        loop {
            if self.shutdown.is_shutdown_requested() {
                break;
            }

            let poll = self.driver.receive_messages(
                &self.config.queue,
                self.config.max_messages,
                self.config.visibility_timeout,
                self.wait_time,
            );
            let result = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                result = poll => result,
            };

            match result {
                Ok(batch) => {
                    backoff.reset();
                    if batch.is_empty() {
                        if self.wait_time.is_zero() {
                            tokio::select! {
                                biased;
                                _ = shutdown_rx.recv() => break,
                                _ = tokio::time::sleep(SHORT_POLL_INTERVAL) => {}
                            }
                        } else {
                            // A driver may return early without suspending
                            tokio::task::yield_now().await;
                        }
                        continue;
                    }
                    self.stats.record_received(batch.len());
                    log::trace!(
                        "Worker {}#{} received {} message(s)",
                        self.listener_name,
                        self.worker_id,
                        batch.len()
                    );
                    self.process_batch(batch).await;
                }
                Err(e) => {
                    self.stats.record_poll_error();
                    let delay = backoff.next_delay();
                    log::warn!(
                        "Worker {}#{} failed to poll '{}' ({} consecutive): {}; retrying in {:?}",
                        self.listener_name,
                        self.worker_id,
                        self.config.queue,
                        backoff.failures(),
                        e,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        log::debug!("Worker {}#{} stopped", self.listener_name, self.worker_id);
    }

    async fn process_batch(&self, batch: Vec<Message>) {
        let mut messages = batch.into_iter();
        while let Some(message) = messages.next() {
            if self.shutdown.is_shutdown_requested() {
                let remaining: Vec<Message> = std::iter::once(message).chain(messages).collect();
                self.release(remaining).await;
                return;
            }
            self.dispatch(message).await;
        }
    }

    /// Hand back messages that were received but never dispatched
    async fn release(&self, messages: Vec<Message>) {
        if !self.release_unprocessed {
            log::debug!(
                "Leaving {} undispatched message(s) to visibility timeout",
                messages.len()
            );
            return;
        }
        for message in messages {
            match self.driver.reject(&message, true, None).await {
                Ok(()) => {
                    self.stats.record_resolution(Resolution::Requeued);
                    log::debug!("Released undispatched message {}", message.id());
                }
                Err(e) => {
                    self.stats.record_driver_error();
                    log::warn!("Failed to release message {}: {}", message.id(), e);
                }
            }
        }
    }

    async fn dispatch(&self, message: Message) {
        let message = Arc::new(message);
        log::debug!(
            "Dispatching message {} to {} (delivery {})",
            message.id(),
            self.listener_name,
            message.received_count()
        );

        let mut context = MessageContext::new(
            Arc::clone(&message),
            Arc::clone(&self.driver),
            self.config.queue.clone(),
        );

        let result = match self.dependencies.resolve(&self.listener_name, &message).await {
            Ok(dependencies) => {
                context = context.with_dependencies(dependencies);
                self.invoke_handler(&message, &context).await
            }
            Err(e) => Err(Box::new(DependencyResolutionFailed {
                listener: self.listener_name.clone(),
                message: e.to_string(),
            }) as HandlerError),
        };

        self.stats.record_handled(result.is_ok());

        if self.config.auto_ack {
            self.finish_auto(&message, &context, result).await;
        } else {
            self.finish_manual(&message, &context, result).await;
        }

        if let Some(resolution) = context.resolution() {
            self.stats.record_resolution(resolution);
        }
    }

    async fn invoke_handler(&self, message: &Message, context: &MessageContext) -> HandlerResult {
        match AssertUnwindSafe(self.listener.handle(message, context))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(Box::new(HandlerPanicked {
                listener: self.listener_name.clone(),
                message: panic_message(panic.as_ref()),
            }) as HandlerError),
        }
    }

    async fn finish_auto(&self, message: &Message, context: &MessageContext, result: HandlerResult) {
        let outcome = decide_outcome(&self.config, message.received_count(), result.is_ok());

        if let Err(error) = result {
            log::warn!(
                "Listener {} failed on message {} (delivery {}): {}; outcome: {}",
                self.listener_name,
                message.id(),
                message.received_count(),
                error,
                outcome
            );
            self.notify_error(message, &error).await;
        }

        if let Some(resolution) = context.resolution() {
            log::debug!(
                "Message {} already {} by handler; skipping {}",
                message.id(),
                resolution,
                outcome
            );
            return;
        }

        let applied = match outcome {
            Outcome::Ack => context.ack().await,
            Outcome::RequeueRetry => context.reject(true, None).await,
            Outcome::DeadLetter => context.reject(false, None).await,
        };
        self.log_driver_result(message, outcome, applied);
    }

    async fn finish_manual(
        &self,
        message: &Message,
        context: &MessageContext,
        result: HandlerResult,
    ) {
        if let Err(error) = result {
            log::warn!(
                "Listener {} failed on message {}: {}",
                self.listener_name,
                message.id(),
                error
            );
            self.notify_error(message, &error).await;
        }

        if !context.is_resolved() {
            log::warn!(
                "Listener {} returned without resolving message {}; it will be redelivered after the {}s visibility timeout",
                self.listener_name,
                message.id(),
                self.config.visibility_timeout
            );
        }
    }

    async fn notify_error(&self, message: &Message, error: &HandlerError) {
        match AssertUnwindSafe(self.listener.on_error(message, error))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(hook_error)) => log::warn!(
                "on_error hook of {} failed for message {}: {}",
                self.listener_name,
                message.id(),
                hook_error
            ),
            Err(panic) => log::warn!(
                "on_error hook of {} panicked for message {}: {}",
                self.listener_name,
                message.id(),
                panic_message(panic.as_ref())
            ),
        }
    }

    fn log_driver_result(&self, message: &Message, outcome: Outcome, result: QueueResult<()>) {
        match result {
            Ok(()) => log::trace!("Message {} resolved: {}", message.id(), outcome),
            Err(e) if e.is_stale() => {
                self.stats.record_driver_error();
                log::warn!(
                    "Receipt for message {} expired before {}: {}",
                    message.id(),
                    outcome,
                    e
                );
            }
            Err(e) => {
                self.stats.record_driver_error();
                log::warn!("Failed to {} message {}: {}", outcome, message.id(), e);
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
