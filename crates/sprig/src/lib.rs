//! Sprig: per-request lifecycle engine for server-side component trees.
//!
//! A request walks a [`ComponentTree`] through restore-view, apply-request-values,
//! process-validations, update-model-values, invoke-application and render-response.
//! Input nodes turn raw request values into validated, committed model values; nodes
//! queue events that are broadcast after each phase; any hook may short-circuit the
//! remaining phases straight to render.
//!
//! All request state lives in an explicit [`RequestContext`] passed to every hook.
//! Longer-lived state is kept in scopes from [`sprig_scope`].

pub mod application;
pub mod capability;
pub mod command;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod event;
pub mod input;
pub mod lifecycle;
pub mod message;
pub mod model;
pub mod render;
pub mod tree;
pub mod validate;
pub mod value;

pub use application::Application;
pub use command::CommandState;
pub use config::{AbortScope, LifecycleConfig};
pub use context::{DeferredError, RequestContext};
pub use convert::{Converter, ConverterError};
pub use error::{HookFailure, LifecycleError, ListenerError, ModelError, TreeError};
pub use event::{broadcast, BroadcastOutcome, EventPayload, EventQueue, FacesEvent, PhaseId};
pub use input::{EditableValue, InputState};
pub use lifecycle::{Lifecycle, PhaseListener};
pub use message::{FacesMessage, MessageBundle, MessageKey, Messages, Severity};
pub use model::{MapModel, ModelAccess, ValueBinding};
pub use render::{OutlineRenderer, Renderer, ResponseRenderer};
pub use tree::{ComponentNode, ComponentTree, ListenerKind, NodeId, NodeKind, OutputState};
pub use validate::{LengthValidator, PatternValidator, RangeValidator, Validator, ValidatorError};
pub use value::{Value, ValueType};

pub use sprig_scope;
