//! Listener Registry
//!
//! Process-wide list of listener registrations. Populated at process init,
//! either explicitly with `register_listener` or from `declare_listener!`
//! declarations via `register_declared_listeners`, and read by
//! `ListenerManager::from_registry`.
//!
//! While any manager is running the registry is sealed: reads still work,
//! but `register_listener` and `clear_listener_registry` fail with
//! `ListenerError::RegistrySealed`.

use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::listener::config::ListenerConfig;
use crate::listener::error::{ListenerError, ListenerResult};
use crate::listener::traits::JobListener;
use std::sync::{Arc, LazyLock, RwLock};

type ListenerFactory = Arc<dyn Fn() -> Arc<dyn JobListener> + Send + Sync>;

/// A listener type bound to its configuration
#[derive(Clone)]
pub struct ListenerRegistration {
    name: String,
    config: ListenerConfig,
    factory: ListenerFactory,
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

/// Registrations compare by name and config; factories are not comparable
impl PartialEq for ListenerRegistration {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.config == other.config
    }
}

impl ListenerRegistration {
    /// Register listener type `L`, named after the type
    pub fn of<L>(config: ListenerConfig) -> Self
    where
        L: JobListener + Default + 'static,
    {
        Self::with_factory(short_type_name::<L>(), config, || {
            Arc::new(L::default()) as Arc<dyn JobListener>
        })
    }

    /// Register a listener built by `factory` when the manager starts
    pub fn with_factory<F>(name: impl Into<String>, config: ListenerConfig, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn JobListener> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            config,
            factory: Arc::new(factory),
        }
    }

    /// Register an already-built listener instance
    pub fn with_instance(
        name: impl Into<String>,
        config: ListenerConfig,
        listener: Arc<dyn JobListener>,
    ) -> Self {
        Self::with_factory(name, config, move || Arc::clone(&listener))
    }

    /// Rename the registration
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut ListenerConfig {
        &mut self.config
    }

    pub fn validate(&self) -> ListenerResult<()> {
        self.config.validate(&self.name)
    }

    pub(crate) fn instantiate(&self) -> Arc<dyn JobListener> {
        (self.factory)()
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[derive(Default)]
struct RegistryState {
    registrations: Vec<ListenerRegistration>,
    seals: usize,
}

static LISTENER_REGISTRY: LazyLock<RwLock<RegistryState>> = LazyLock::new(|| {
    log::trace!("Initializing listener registry");
    RwLock::new(RegistryState::default())
});

fn unavailable(message: String) -> ListenerError {
    ListenerError::RegistryUnavailable { message }
}

/// Add a registration to the process-wide registry
///
/// Registering the same name with an equal config again is a no-op. The
/// same name with a different config is a `ConflictingRegistration`.
pub fn register_listener(registration: ListenerRegistration) -> ListenerResult<()> {
    registration.validate()?;

    let mut state = handle_rwlock_write(LISTENER_REGISTRY.write(), unavailable)?;
    if state.seals > 0 {
        return Err(ListenerError::RegistrySealed {
            operation: format!("register listener '{}'", registration.name),
        });
    }

    if let Some(existing) = state
        .registrations
        .iter()
        .find(|existing| existing.name == registration.name)
    {
        if existing.config == registration.config {
            log::trace!("Listener '{}' already registered", registration.name);
            return Ok(());
        }
        return Err(ListenerError::ConflictingRegistration {
            listener: registration.name,
        });
    }

    log::debug!(
        "Registered listener '{}' on queue '{}'",
        registration.name,
        registration.config.queue
    );
    state.registrations.push(registration);
    Ok(())
}

/// Snapshot of the registry in registration order
///
/// The returned `Vec` is independent of the registry.
pub fn get_listener_registry() -> ListenerResult<Vec<ListenerRegistration>> {
    let state = handle_rwlock_read(LISTENER_REGISTRY.read(), unavailable)?;
    Ok(state.registrations.clone())
}

/// Remove every registration
pub fn clear_listener_registry() -> ListenerResult<()> {
    let mut state = handle_rwlock_write(LISTENER_REGISTRY.write(), unavailable)?;
    if state.seals > 0 {
        return Err(ListenerError::RegistrySealed {
            operation: "clear listener registry".to_string(),
        });
    }
    state.registrations.clear();
    log::trace!("Listener registry cleared");
    Ok(())
}

/// True while at least one manager is running
pub fn is_registry_sealed() -> bool {
    match LISTENER_REGISTRY.read() {
        Ok(state) => state.seals > 0,
        Err(poisoned) => poisoned.into_inner().seals > 0,
    }
}

/// Guard returned by `seal_registry`; unseals when dropped
#[derive(Debug)]
pub(crate) struct RegistrySeal {
    _private: (),
}

pub(crate) fn seal_registry() -> RegistrySeal {
    let mut state = match LISTENER_REGISTRY.write() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    };
    state.seals += 1;
    RegistrySeal { _private: () }
}

impl Drop for RegistrySeal {
    fn drop(&mut self) {
        let mut state = match LISTENER_REGISTRY.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.seals = state.seals.saturating_sub(1);
    }
}
