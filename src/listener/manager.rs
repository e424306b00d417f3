//! Listener Manager
//!
//! Runs a set of listener registrations against one shared queue driver.
//!
//! ```text
//! Created ──start()──▶ Connecting ──connect ok──▶ Running ──stop()──▶ Stopping ──▶ Stopped
//!                          │                                                         ▲
//!                          └──────── connect error / on_startup error ───────────────┘
//! ```
//!
//! `start` connects the driver, calls `on_startup` on every listener and then
//! spawns `workers` worker loops per listener. `stop` signals the workers,
//! waits up to `shutdown_timeout` for in-flight handlers, aborts whatever is
//! still running, calls `on_shutdown` on every listener and disconnects.
//! Every path out of `Connecting` or `Running` ends in `Stopped`.

use crate::core::error_handling::log_error_with_context;
use crate::core::retry::BackoffPolicy;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::time::deadline_after;
use crate::core::version::{crate_version, get_api_version, git_hash};
use crate::listener::dependencies::{DependencyProvider, StaticDependencies};
use crate::listener::error::{ListenerError, ManagerError, ManagerResult};
use crate::listener::registry::{
    get_listener_registry, seal_registry, ListenerRegistration, RegistrySeal,
};
use crate::listener::stats::{ListenerStats, ListenerStatsSnapshot};
use crate::listener::traits::JobListener;
use crate::listener::worker::{panic_message, Worker};
use crate::queue::api::QueueDriver;
use futures::FutureExt;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Lifecycle state of a `ListenerManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerState {
    Created,
    Connecting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerState::Created => "created",
            ManagerState::Connecting => "connecting",
            ManagerState::Running => "running",
            ManagerState::Stopping => "stopping",
            ManagerState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Runtime settings shared by every worker of a manager
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Upper bound on one long-poll, in seconds
    #[serde(with = "crate::core::time::duration_secs")]
    pub wait_time: Duration,
    /// Grace period for in-flight handlers on stop, in seconds
    #[serde(with = "crate::core::time::duration_secs")]
    pub shutdown_timeout: Duration,
    /// Backoff applied after failed polls
    pub poll_backoff: BackoffPolicy,
    /// Requeue received-but-undispatched messages on stop
    pub release_unprocessed_on_shutdown: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(20),
            shutdown_timeout: Duration::from_secs(10),
            poll_backoff: BackoffPolicy::default(),
            release_unprocessed_on_shutdown: true,
        }
    }
}

impl ManagerConfig {
    pub fn wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn poll_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.poll_backoff = policy;
        self
    }

    pub fn release_unprocessed_on_shutdown(mut self, release: bool) -> Self {
        self.release_unprocessed_on_shutdown = release;
        self
    }
}

/// Cloneable trigger for stopping a manager from another task
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    coordinator: ShutdownCoordinator,
}

impl ShutdownHandle {
    /// Request shutdown; `run_until_shutdown` then stops the manager
    pub fn trigger(&self) {
        self.coordinator.trigger_shutdown();
    }

    pub fn is_triggered(&self) -> bool {
        self.coordinator.is_shutdown_requested()
    }
}

struct ActiveListener {
    name: String,
    listener: Arc<dyn JobListener>,
}

pub struct ListenerManager {
    driver: Arc<dyn QueueDriver>,
    registrations: Vec<ListenerRegistration>,
    config: ManagerConfig,
    dependencies: Arc<dyn DependencyProvider>,
    shutdown: ShutdownCoordinator,
    state_tx: watch::Sender<ManagerState>,
    stats: BTreeMap<String, Arc<ListenerStats>>,
    active: Vec<ActiveListener>,
    workers: JoinSet<()>,
    seal: Option<RegistrySeal>,
}

impl fmt::Debug for ListenerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerManager")
            .field("state", &self.state())
            .field("registrations", &self.registrations)
            .field("config", &self.config)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl ListenerManager {
    pub fn new(driver: Arc<dyn QueueDriver>, registrations: Vec<ListenerRegistration>) -> Self {
        let (state_tx, _) = watch::channel(ManagerState::Created);
        Self {
            driver,
            registrations,
            config: ManagerConfig::default(),
            dependencies: Arc::new(StaticDependencies::default()),
            shutdown: ShutdownCoordinator::new(),
            state_tx,
            stats: BTreeMap::new(),
            active: Vec::new(),
            workers: JoinSet::new(),
            seal: None,
        }
    }

    /// Manager over a snapshot of the process-wide registry
    pub fn from_registry(driver: Arc<dyn QueueDriver>) -> ManagerResult<Self> {
        let registrations = get_listener_registry()?;
        Ok(Self::new(driver, registrations))
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dependency_provider(mut self, provider: Arc<dyn DependencyProvider>) -> Self {
        self.dependencies = provider;
        self
    }

    pub fn registrations(&self) -> &[ListenerRegistration] {
        &self.registrations
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn state(&self) -> ManagerState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ManagerState> {
        self.state_tx.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            coordinator: self.shutdown.clone(),
        }
    }

    /// Counters per listener name, empty before `start`
    pub fn stats(&self) -> BTreeMap<String, ListenerStatsSnapshot> {
        self.stats
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect()
    }

    /// Worker tasks still alive; finished or panicked workers are reaped first
    pub fn worker_count(&mut self) -> usize {
        while let Some(result) = self.workers.try_join_next() {
            match result {
                Ok(()) => log::debug!("Listener worker exited"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => log::error!("Listener worker terminated abnormally: {}", e),
            }
        }
        self.workers.len()
    }

    fn set_state(&self, state: ManagerState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            log::info!("Listener manager {} -> {}", previous, state);
        }
    }

    fn validate_registrations(&self) -> ManagerResult<()> {
        let mut names = HashSet::new();
        for registration in &self.registrations {
            registration.validate()?;
            if !names.insert(registration.name()) {
                return Err(ListenerError::ConflictingRegistration {
                    listener: registration.name().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Connect the driver, run startup hooks and spawn every worker
    pub async fn start(&mut self) -> ManagerResult<()> {
        let state = self.state();
        if state != ManagerState::Created {
            return Err(ManagerError::InvalidState {
                operation: "start".to_string(),
                state,
            });
        }

        if let Err(e) = self.validate_registrations() {
            log_error_with_context(&e, "Listener manager start");
            self.set_state(ManagerState::Stopped);
            return Err(e);
        }
        if self.registrations.is_empty() {
            log::warn!("Starting listener manager with no registered listeners");
        }

        log::info!(
            "joblistener {} ({}, listener api {}) starting {} listener(s)",
            crate_version(),
            git_hash(),
            get_api_version(),
            self.registrations.len()
        );
        self.set_state(ManagerState::Connecting);
        if let Err(source) = self.driver.connect().await {
            let error = ManagerError::Connection { source };
            log_error_with_context(&error, "Listener manager start");
            self.set_state(ManagerState::Stopped);
            return Err(error);
        }
        log::info!("Queue driver connected");

        for registration in self.registrations.clone() {
            let listener = registration.instantiate();
            if let Err(cause) = run_hook(listener.on_startup()).await {
                let error = ManagerError::StartupHook {
                    listener: registration.name().to_string(),
                    cause,
                };
                log_error_with_context(&error, "Listener startup");
                self.run_shutdown_hooks().await;
                self.disconnect().await;
                self.set_state(ManagerState::Stopped);
                return Err(error);
            }
            self.active.push(ActiveListener {
                name: registration.name().to_string(),
                listener,
            });
        }

        self.seal = Some(seal_registry());
        self.set_state(ManagerState::Running);

        for (registration, active) in self.registrations.iter().zip(&self.active) {
            let stats = Arc::new(ListenerStats::new());
            self.stats.insert(active.name.clone(), Arc::clone(&stats));

            let config = registration.config();
            for worker_id in 0..config.workers {
                let worker = Worker {
                    listener_name: active.name.clone(),
                    worker_id,
                    config: config.clone(),
                    listener: Arc::clone(&active.listener),
                    driver: Arc::clone(&self.driver),
                    dependencies: Arc::clone(&self.dependencies),
                    stats: Arc::clone(&stats),
                    wait_time: self.config.wait_time,
                    poll_backoff: self.config.poll_backoff.clone(),
                    release_unprocessed: self.config.release_unprocessed_on_shutdown,
                    shutdown: self.shutdown.clone(),
                };
                self.workers.spawn(worker.run());
            }
            log::info!(
                "Listener {} consuming '{}' with {} worker(s)",
                active.name,
                config.queue,
                config.workers
            );
        }

        Ok(())
    }

    /// Stop every worker and release resources. Safe to call repeatedly.
    pub async fn stop(&mut self) -> ManagerResult<()> {
        match self.state() {
            ManagerState::Stopped => return Ok(()),
            ManagerState::Created => {
                self.set_state(ManagerState::Stopped);
                return Ok(());
            }
            _ => {}
        }

        self.set_state(ManagerState::Stopping);
        self.shutdown.trigger_shutdown();

        self.join_workers().await;
        self.run_shutdown_hooks().await;
        self.disconnect().await;

        self.seal = None;
        self.set_state(ManagerState::Stopped);
        Ok(())
    }

    /// Start, wait for a shutdown request or OS signal, then stop
    pub async fn run_until_shutdown(&mut self) -> ManagerResult<()> {
        self.shutdown.install_signal_handlers();
        self.start().await?;
        self.shutdown.wait_for_shutdown().await;
        log::info!("Shutdown requested");
        self.stop().await
    }

    async fn join_workers(&mut self) {
        let deadline = deadline_after(self.config.shutdown_timeout);

        loop {
            match tokio::time::timeout_at(deadline, self.workers.join_next()).await {
                Ok(None) => break,
                Ok(Some(Ok(()))) => {}
                Ok(Some(Err(e))) => log::error!("Listener worker terminated abnormally: {}", e),
                Err(_) => {
                    log::error!(
                        "{} worker(s) still busy after {:?}; aborting",
                        self.workers.len(),
                        self.config.shutdown_timeout
                    );
                    self.workers.abort_all();
                    while let Some(result) = self.workers.join_next().await {
                        if let Err(e) = result {
                            if !e.is_cancelled() {
                                log::error!("Listener worker terminated abnormally: {}", e);
                            }
                        }
                    }
                    break;
                }
            }
        }
    }

    async fn run_shutdown_hooks(&mut self) {
        for active in self.active.drain(..) {
            if let Err(cause) = run_hook(active.listener.on_shutdown()).await {
                log::warn!("Listener {} failed during on_shutdown: {}", active.name, cause);
            }
        }
    }

    async fn disconnect(&self) {
        match self.driver.disconnect().await {
            Ok(()) => log::info!("Queue driver disconnected"),
            Err(e) => log::warn!("Queue driver disconnect failed: {}", e),
        }
    }
}

/// Run a lifecycle hook, turning errors and panics into a description
async fn run_hook<F>(hook: F) -> Result<(), String>
where
    F: std::future::Future<Output = crate::listener::error::HandlerResult>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}
