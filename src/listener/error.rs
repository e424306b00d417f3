//! Listener Error Types
//!
//! Three families of failure live here:
//!
//! - `ListenerError`: contract violations caught at declaration or registration
//!   time (bad config, registry sealed). Always fatal to the caller.
//! - `ManagerError`: failures of the orchestrator itself. Only connection and
//!   startup failures are fatal; everything per-message is recovered inside
//!   the worker loop.
//! - `HandlerError`: whatever a listener's `handle` returns. Boxed so that
//!   handlers can use their own error types.

use crate::core::error_handling::ContextualError;
use crate::listener::manager::ManagerState;
use crate::queue::api::QueueError;

/// Error returned by listener handlers and hooks
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for listener handlers and hooks
pub type HandlerResult = Result<(), HandlerError>;

/// Result type alias for listener declaration and registry operations
pub type ListenerResult<T> = std::result::Result<T, ListenerError>;

/// Result type alias for manager operations
pub type ManagerResult<T> = std::result::Result<T, ManagerError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener '{listener}' has invalid configuration: {reason}")]
    InvalidConfig { listener: String, reason: String },

    #[error("Listener registry is sealed while a manager is running; cannot {operation}")]
    RegistrySealed { operation: String },

    #[error("Listener '{listener}' is already registered with a different configuration")]
    ConflictingRegistration { listener: String },

    #[error("Listener registry unavailable: {message}")]
    RegistryUnavailable { message: String },
}

impl ContextualError for ListenerError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ListenerError::RegistryUnavailable { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ListenerError::InvalidConfig { reason, .. } => Some(reason),
            ListenerError::RegistrySealed { .. } => {
                Some("Listeners must be registered before the listener manager starts")
            }
            ListenerError::ConflictingRegistration { .. } => {
                Some("Two listener registrations share a name but differ in configuration")
            }
            ListenerError::RegistryUnavailable { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Failed to connect queue driver: {source}")]
    Connection {
        #[source]
        source: QueueError,
    },

    #[error("Listener '{listener}' failed during on_startup: {cause}")]
    StartupHook { listener: String, cause: String },

    #[error("Cannot {operation} while manager is {state}")]
    InvalidState {
        operation: String,
        state: ManagerState,
    },

    #[error("Listener declaration error")]
    Listener {
        #[from]
        #[source]
        source: ListenerError,
    },
}

impl ContextualError for ManagerError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ManagerError::Listener { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ManagerError::Listener { source } => source.user_message(),
            _ => None,
        }
    }
}

/// A handler panicked instead of returning an error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Handler for listener '{listener}' panicked: {message}")]
pub struct HandlerPanicked {
    pub listener: String,
    pub message: String,
}

/// Dependencies for a handler could not be resolved
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to resolve dependencies for listener '{listener}': {message}")]
pub struct DependencyResolutionFailed {
    pub listener: String,
    pub message: String,
}
