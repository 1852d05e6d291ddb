use sprig_scope::ScopeError;
use thiserror::Error;

use crate::event::PhaseId;
use crate::tree::NodeId;
use crate::value::ValueType;

/// Failure reported by the external model when reading or writing a property.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("property `{0}` not found")]
    PropertyNotFound(String),
    #[error("property `{0}` is read-only")]
    ReadOnly(String),
    #[error("property `{path}` expects {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: ValueType,
        actual: ValueType,
    },
    #[error("property `{path}` rejected the value: {reason}")]
    Rejected { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("client id `{0}` is already used in this tree")]
    DuplicateId(String),
    #[error("node {0:?} is not part of this tree")]
    UnknownNode(NodeId),
    #[error("the root node cannot be detached")]
    RootDetach,
}

/// Unexpected failure inside a per-node phase hook.
#[derive(Debug, Error)]
pub enum HookFailure {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("no {kind} registered under `{id}`")]
    Unresolved { kind: &'static str, id: String },
    #[error("renderer failed: {0}")]
    Renderer(String),
}

/// Outcome signalled by an event listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// Stop dispatching and discard pending events. Not a failure.
    #[error("event processing aborted")]
    Abort,
    #[error("{0}")]
    Failure(String),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{phase} failed at `{client_id}`: {source}")]
    Hook {
        phase: PhaseId,
        client_id: String,
        #[source]
        source: HookFailure,
    },
    #[error("listener on `{client_id}` failed: {reason}")]
    Listener { client_id: String, reason: String },
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("render failed: {0}")]
    Render(String),
}
