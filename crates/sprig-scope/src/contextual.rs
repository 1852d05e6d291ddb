//! Contextual objects: things a scope knows how to create and destroy.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::ScopeError;

/// A created contextual instance, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Process-local identity of a contextual object.
///
/// Only meaningful inside one process. Contextual objects that must survive
/// serialization expose a [`Contextual::passivation_id`] instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextualId(Ulid);

impl ContextualId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ContextualId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage key for one contextual object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BeanKey {
    /// Keyed by object identity (same process only).
    Identity(ContextualId),
    /// Keyed by the stable passivation identifier.
    Passivation(Arc<str>),
}

impl fmt::Display for BeanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanKey::Identity(id) => write!(f, "identity:{}", id),
            BeanKey::Passivation(id) => write!(f, "passivation:{}", id),
        }
    }
}

/// Something a scope can create an instance of, and later tear it down.
pub trait Contextual: Send + Sync {
    fn id(&self) -> ContextualId;

    /// Stable string identity, if this object is passivation-capable.
    fn passivation_id(&self) -> Option<&str> {
        None
    }

    fn create(&self, creational: &CreationalContext) -> Result<Instance, ScopeError>;

    /// Destruction callback. Invoked at most once per created instance.
    fn destroy(&self, instance: Instance, creational: &CreationalContext) {
        let _ = (instance, creational);
    }
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// Per-instance creation state: dependents registered while the instance was built.
///
/// Dependents are released, newest first, after the owning instance is destroyed.
pub struct CreationalContext {
    contextual: ContextualId,
    dependents: Mutex<Vec<Cleanup>>,
}

impl CreationalContext {
    pub fn new(contextual: ContextualId) -> Self {
        Self {
            contextual,
            dependents: Mutex::new(Vec::new()),
        }
    }

    pub fn contextual(&self) -> ContextualId {
        self.contextual
    }

    /// Register cleanup for a dependent object created alongside the instance.
    pub fn push_dependent(&self, cleanup: impl FnOnce() + Send + 'static) {
        self.dependents.lock().push(Box::new(cleanup));
    }

    pub fn dependent_count(&self) -> usize {
        self.dependents.lock().len()
    }

    /// Run and forget all dependent cleanups.
    pub fn release(&self) {
        let dependents = std::mem::take(&mut *self.dependents.lock());
        for cleanup in dependents.into_iter().rev() {
            cleanup();
        }
    }
}

impl fmt::Debug for CreationalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationalContext")
            .field("contextual", &self.contextual)
            .field("dependents", &self.dependent_count())
            .finish()
    }
}

type CreateFn<T> = Box<dyn Fn(&CreationalContext) -> Result<T, String> + Send + Sync>;
type DestroyFn<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Closure-backed contextual object producing `Arc<T>` instances.
pub struct Bean<T> {
    id: ContextualId,
    passivation_id: Option<String>,
    create: CreateFn<T>,
    destroy: Option<DestroyFn<T>>,
}

impl<T: Send + Sync + 'static> Bean<T> {
    pub fn new(create: impl Fn(&CreationalContext) -> Result<T, String> + Send + Sync + 'static) -> Self {
        Self {
            id: ContextualId::new(),
            passivation_id: None,
            create: Box::new(create),
            destroy: None,
        }
    }

    pub fn with_passivation_id(mut self, id: impl Into<String>) -> Self {
        self.passivation_id = Some(id.into());
        self
    }

    pub fn on_destroy(mut self, destroy: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.destroy = Some(Box::new(destroy));
        self
    }

    pub fn into_contextual(self) -> Arc<dyn Contextual> {
        Arc::new(self)
    }
}

impl<T: Send + Sync + 'static> Contextual for Bean<T> {
    fn id(&self) -> ContextualId {
        self.id
    }

    fn passivation_id(&self) -> Option<&str> {
        self.passivation_id.as_deref()
    }

    fn create(&self, creational: &CreationalContext) -> Result<Instance, ScopeError> {
        let value = (self.create)(creational).map_err(|reason| ScopeError::creation(self.id, reason))?;
        Ok(Arc::new(value))
    }

    fn destroy(&self, instance: Instance, _creational: &CreationalContext) {
        if let (Some(destroy), Some(value)) = (&self.destroy, instance.downcast_ref::<T>()) {
            destroy(value);
        }
    }
}
