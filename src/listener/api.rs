//! Public API for the listener system
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Listener contract
pub use crate::listener::context::MessageContext;
pub use crate::listener::traits::JobListener;

// Configuration
pub use crate::listener::config::{ListenerConfig, MAX_BATCH_SIZE};

// Registration
pub use crate::listener::declare::{
    declared_listeners, register_declared_listeners, ListenerDeclaration,
};
pub use crate::listener::registry::{
    clear_listener_registry, get_listener_registry, is_registry_sealed, register_listener,
    ListenerRegistration,
};

// Dependency injection
pub use crate::listener::dependencies::{Dependencies, DependencyProvider, StaticDependencies};

// Orchestration
pub use crate::listener::manager::{
    ListenerManager, ManagerConfig, ManagerState, ShutdownHandle,
};
pub use crate::listener::outcome::{decide_outcome, Outcome};
pub use crate::listener::stats::{ListenerStats, ListenerStatsSnapshot};

// Error handling
pub use crate::listener::error::{
    DependencyResolutionFailed, HandlerError, HandlerPanicked, HandlerResult, ListenerError,
    ListenerResult, ManagerError, ManagerResult,
};
