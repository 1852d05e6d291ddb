//! Scoped instance storage for Sprig.
//!
//! Backs lifetime scopes (request, session, application, custom) with a keyed
//! container that creates each contextual instance at most once and tears all of
//! them down on demand. Has no knowledge of the component tree.

pub mod context;
pub mod contextual;
pub mod error;
pub mod storage;

pub use context::{ScopeContext, ScopeDescriptor};
pub use contextual::{Bean, BeanKey, Contextual, ContextualId, CreationalContext, Instance};
pub use error::ScopeError;
pub use storage::{ContextualStorage, InstanceRecord};
