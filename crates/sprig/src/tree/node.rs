use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::arena::NodeId;
use super::ComponentTree;
use crate::command::CommandState;
use crate::context::RequestContext;
use crate::error::{ListenerError, ModelError};
use crate::event::{EventPayload, FacesEvent};
use crate::input::EditableValue;
use crate::model::{ModelAccess, ValueBinding};
use crate::value::Value;

/// The kind of component and its kind-specific state.
#[derive(Debug)]
pub enum NodeKind {
    /// Groups children; no state of its own.
    Container,
    /// Read-only value display.
    Output(OutputState),
    /// Editable value driven through decode, convert, validate and update.
    Input(EditableValue),
    /// Action source activated by the request.
    Command(CommandState),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::Output(_) => "output",
            NodeKind::Input(_) => "input",
            NodeKind::Command(_) => "command",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OutputState {
    pub value: Option<Value>,
    pub binding: Option<ValueBinding>,
}

impl OutputState {
    pub fn fixed(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            binding: None,
        }
    }

    pub fn bound(path: impl Into<String>) -> Self {
        Self {
            value: None,
            binding: Some(ValueBinding::new(path)),
        }
    }

    /// Bound value when a binding exists, else the fixed value.
    pub fn resolve(&self, model: &dyn ModelAccess) -> Result<Option<Value>, ModelError> {
        match &self.binding {
            Some(binding) => binding.get(model),
            None => Ok(self.value.clone()),
        }
    }
}

pub type ListenerFn = dyn Fn(&mut ComponentTree, &FacesEvent, &mut RequestContext<'_>) -> Result<(), ListenerError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerKind {
    ValueChange,
    Action,
    /// Receives every event, custom events included.
    Any,
}

impl ListenerKind {
    pub fn accepts(self, payload: &EventPayload) -> bool {
        match (self, payload) {
            (ListenerKind::Any, _) => true,
            (ListenerKind::ValueChange, EventPayload::ValueChange { .. }) => true,
            (ListenerKind::Action, EventPayload::Action { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct Listener {
    pub kind: ListenerKind,
    pub callback: Rc<ListenerFn>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// A node of the component tree. Structure (parent, children, facets) is owned by
/// [`ComponentTree`]; everything else is per-node lifecycle state.
#[derive(Debug)]
pub struct ComponentNode {
    pub(crate) client_id: String,
    pub kind: NodeKind,
    /// A non-rendered node skips its whole subtree in every phase but render.
    pub rendered: bool,
    /// A disabled node never decodes request input.
    pub disabled: bool,
    pub label: Option<String>,
    pub renderer_type: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) facets: IndexMap<String, NodeId>,
    pub(crate) listeners: SmallVec<[Listener; 2]>,
}

impl ComponentNode {
    pub fn new(client_id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            client_id: client_id.into(),
            kind,
            rendered: true,
            disabled: false,
            label: None,
            renderer_type: None,
            parent: None,
            children: Vec::new(),
            facets: IndexMap::new(),
            listeners: SmallVec::new(),
        }
    }

    pub fn container(client_id: impl Into<String>) -> Self {
        Self::new(client_id, NodeKind::Container)
    }

    pub fn output(client_id: impl Into<String>, state: OutputState) -> Self {
        Self::new(client_id, NodeKind::Output(state))
    }

    pub fn input(client_id: impl Into<String>, value: EditableValue) -> Self {
        Self::new(client_id, NodeKind::Input(value))
    }

    pub fn command(client_id: impl Into<String>, state: CommandState) -> Self {
        Self::new(client_id, NodeKind::Command(state))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_rendered(mut self, rendered: bool) -> Self {
        self.rendered = rendered;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_renderer(mut self, renderer_type: impl Into<String>) -> Self {
        self.renderer_type = Some(renderer_type.into());
        self
    }

    pub fn on_value_change(
        self,
        f: impl Fn(&mut ComponentTree, &FacesEvent, &mut RequestContext<'_>) -> Result<(), ListenerError> + 'static,
    ) -> Self {
        self.with_listener(ListenerKind::ValueChange, f)
    }

    pub fn on_action(
        self,
        f: impl Fn(&mut ComponentTree, &FacesEvent, &mut RequestContext<'_>) -> Result<(), ListenerError> + 'static,
    ) -> Self {
        self.with_listener(ListenerKind::Action, f)
    }

    pub fn on_event(
        self,
        f: impl Fn(&mut ComponentTree, &FacesEvent, &mut RequestContext<'_>) -> Result<(), ListenerError> + 'static,
    ) -> Self {
        self.with_listener(ListenerKind::Any, f)
    }

    pub fn with_listener(
        mut self,
        kind: ListenerKind,
        f: impl Fn(&mut ComponentTree, &FacesEvent, &mut RequestContext<'_>) -> Result<(), ListenerError> + 'static,
    ) -> Self {
        self.add_listener(kind, f);
        self
    }

    pub fn add_listener(
        &mut self,
        kind: ListenerKind,
        f: impl Fn(&mut ComponentTree, &FacesEvent, &mut RequestContext<'_>) -> Result<(), ListenerError> + 'static,
    ) {
        self.listeners.push(Listener {
            kind,
            callback: Rc::new(f),
        });
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Label used in messages, falling back to the client id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.client_id)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn facet(&self, name: &str) -> Option<NodeId> {
        self.facets.get(name).copied()
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub fn as_input(&self) -> Option<&EditableValue> {
        match &self.kind {
            NodeKind::Input(input) => Some(input),
            _ => None,
        }
    }

    pub fn as_input_mut(&mut self) -> Option<&mut EditableValue> {
        match &mut self.kind {
            NodeKind::Input(input) => Some(input),
            _ => None,
        }
    }

    pub fn as_command(&self) -> Option<&CommandState> {
        match &self.kind {
            NodeKind::Command(command) => Some(command),
            _ => None,
        }
    }
}
