//! Scope contexts: an activation flag and a descriptor around one storage.

use std::any::{Any, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::contextual::{Contextual, Instance};
use crate::error::ScopeError;
use crate::storage::ContextualStorage;

/// Static description of a scope kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    pub name: String,
    /// Instances may be serialized; passivation-capable objects are keyed by their stable id.
    pub passivating: bool,
    /// Reachable from more than one thread at a time.
    pub concurrent: bool,
}

impl ScopeDescriptor {
    pub fn new(name: impl Into<String>, passivating: bool, concurrent: bool) -> Self {
        Self {
            name: name.into(),
            passivating,
            concurrent,
        }
    }

    pub fn request() -> Self {
        Self::new("request", false, false)
    }

    pub fn session() -> Self {
        Self::new("session", true, true)
    }

    pub fn application() -> Self {
        Self::new("application", false, true)
    }
}

/// A live scope: lookups fail with [`ScopeError::ContextNotActive`] while inactive.
#[derive(Debug)]
pub struct ScopeContext {
    descriptor: ScopeDescriptor,
    storage: ContextualStorage,
    active: AtomicBool,
}

impl ScopeContext {
    /// Create an active scope.
    pub fn new(descriptor: ScopeDescriptor) -> Self {
        let storage = ContextualStorage::new(descriptor.concurrent, descriptor.passivating);
        Self {
            descriptor,
            storage,
            active: AtomicBool::new(true),
        }
    }

    pub fn descriptor(&self) -> &ScopeDescriptor {
        &self.descriptor
    }

    pub fn storage(&self) -> &ContextualStorage {
        &self.storage
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn check_active(&self) -> Result<(), ScopeError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ScopeError::ContextNotActive {
                scope: self.descriptor.name.clone(),
            })
        }
    }

    pub fn get(&self, contextual: &dyn Contextual) -> Result<Option<Instance>, ScopeError> {
        self.check_active()?;
        Ok(self.storage.get(contextual).map(|record| record.instance().clone()))
    }

    pub fn get_or_create(&self, contextual: &Arc<dyn Contextual>) -> Result<Instance, ScopeError> {
        self.check_active()?;
        let record = self.storage.get_or_create(contextual)?;
        Ok(record.instance().clone())
    }

    /// Typed variant of [`ScopeContext::get_or_create`].
    pub fn get_or_create_as<T: Any + Send + Sync>(
        &self,
        contextual: &Arc<dyn Contextual>,
    ) -> Result<Arc<T>, ScopeError> {
        self.get_or_create(contextual)?
            .downcast::<T>()
            .map_err(|_| ScopeError::TypeMismatch {
                contextual: contextual.id().to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn destroy(&self, contextual: &dyn Contextual) -> Result<bool, ScopeError> {
        self.check_active()?;
        Ok(self.storage.destroy(contextual))
    }

    /// Tear down every instance. Allowed on an inactive scope, so ending a scope can
    /// deactivate it first and destroy afterwards.
    pub fn destroy_all(&self) -> usize {
        log::debug!("destroying all instances of scope `{}`", self.descriptor.name);
        self.storage.destroy_all()
    }
}
