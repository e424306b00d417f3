//! Handler Dependency Injection
//!
//! Handlers often need live services (an email client, a repository) that
//! should not be owned by the listener itself. Before each dispatch the
//! manager asks its `DependencyProvider` for a `Dependencies` bag, which the
//! handler reads through `MessageContext::dependency::<T>()`.
//!
//! A provider that fails turns into an ordinary handler failure: the message
//! goes through `on_error` and the retry policy like any other error.

use crate::listener::error::HandlerError;
use crate::queue::api::Message;
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed set of shared services
#[derive(Clone, Default)]
pub struct Dependencies {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("count", &self.values.len())
            .finish()
    }
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service, replacing any previous value of the same type
    pub fn insert<T: Any + Send + Sync>(&mut self, value: Arc<T>) {
        self.values.insert(TypeId::of::<T>(), value);
    }

    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(Arc::new(value));
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolves handler dependencies just before `handle` runs
#[async_trait]
pub trait DependencyProvider: Send + Sync {
    async fn resolve(&self, listener: &str, message: &Message)
        -> Result<Dependencies, HandlerError>;
}

/// Provider that hands every dispatch the same set of services
#[derive(Debug, Clone, Default)]
pub struct StaticDependencies {
    dependencies: Dependencies,
}

impl StaticDependencies {
    pub fn new(dependencies: Dependencies) -> Self {
        Self { dependencies }
    }
}

#[async_trait]
impl DependencyProvider for StaticDependencies {
    async fn resolve(
        &self,
        _listener: &str,
        _message: &Message,
    ) -> Result<Dependencies, HandlerError> {
        Ok(self.dependencies.clone())
    }
}
