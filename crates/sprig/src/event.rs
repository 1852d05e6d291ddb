//! Phase-tagged event queue attached to the tree root, and the broadcaster that drains it.

use std::fmt;

use serde::Serialize;

use crate::config::AbortScope;
use crate::context::RequestContext;
use crate::error::{LifecycleError, ListenerError};
use crate::tree::{ComponentTree, NodeId};
use crate::value::Value;

/// Processing phases in execution order. `Any` is the wildcard event tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseId {
    Any = 0,
    RestoreView = 1,
    ApplyRequestValues = 2,
    ProcessValidations = 3,
    UpdateModelValues = 4,
    InvokeApplication = 5,
    RenderResponse = 6,
}

impl PhaseId {
    /// Phases run by `Lifecycle::execute`, in order.
    pub const EXECUTE: [PhaseId; 5] = [
        PhaseId::RestoreView,
        PhaseId::ApplyRequestValues,
        PhaseId::ProcessValidations,
        PhaseId::UpdateModelValues,
        PhaseId::InvokeApplication,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// True when an event tagged `self` is due in `phase`.
    pub fn matches(self, phase: PhaseId) -> bool {
        self == PhaseId::Any || self == phase
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseId::Any => "ANY",
            PhaseId::RestoreView => "RESTORE_VIEW",
            PhaseId::ApplyRequestValues => "APPLY_REQUEST_VALUES",
            PhaseId::ProcessValidations => "PROCESS_VALIDATIONS",
            PhaseId::UpdateModelValues => "UPDATE_MODEL_VALUES",
            PhaseId::InvokeApplication => "INVOKE_APPLICATION",
            PhaseId::RenderResponse => "RENDER_RESPONSE",
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    ValueChange {
        old: Option<Value>,
        new: Option<Value>,
    },
    Action {
        outcome: Option<String>,
    },
    Custom {
        name: String,
        value: Option<Value>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FacesEvent {
    pub source: NodeId,
    pub phase: PhaseId,
    pub payload: EventPayload,
}

impl FacesEvent {
    pub fn new(source: NodeId, phase: PhaseId, payload: EventPayload) -> Self {
        Self { source, phase, payload }
    }

    pub fn custom(source: NodeId, phase: PhaseId, name: impl Into<String>, value: Option<Value>) -> Self {
        Self::new(
            source,
            phase,
            EventPayload::Custom {
                name: name.into(),
                value,
            },
        )
    }
}

/// Pending events in enqueue order. One per tree, never outlives the request.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<FacesEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. The phase tag is not checked here.
    pub fn push(&mut self, event: FacesEvent) {
        log::trace!("queued {:?} event from {} for {}", event.payload, event.source, event.phase);
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FacesEvent> {
        self.events.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FacesEvent> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn remove(&mut self, index: usize) -> FacesEvent {
        self.events.remove(index)
    }

    /// Drop every event still due in `phase`, wildcard events included.
    fn discard_phase(&mut self, phase: PhaseId) -> usize {
        let before = self.events.len();
        self.events.retain(|event| !event.phase.matches(phase));
        before - self.events.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Completed,
    Aborted,
}

/// Dispatch every queued event due in `phase` to its source node's broadcast hook.
///
/// Each event is taken out of the queue before its hook runs, so it is delivered at most
/// once whatever the hook does. Hooks may enqueue new events or clear the queue; the
/// cursor is re-checked against the live queue after every dispatch. Events appended
/// during the drain that are due in `phase` are dispatched by the same call.
pub fn broadcast(
    tree: &mut ComponentTree,
    phase: PhaseId,
    ctx: &mut RequestContext<'_>,
) -> Result<BroadcastOutcome, LifecycleError> {
    let mut outcome = BroadcastOutcome::Completed;
    let mut cursor = 0;

    while cursor < tree.events().len() {
        let due = tree
            .events()
            .get(cursor)
            .is_some_and(|event| event.phase.matches(phase));
        if !due {
            cursor += 1;
            continue;
        }

        let event = tree.events_mut().remove(cursor);
        let Some(node) = tree.node(event.source) else {
            log::warn!("dropping {} event: source {} is no longer in the tree", phase, event.source);
            continue;
        };
        let hook = node.kind.capabilities().broadcast;

        match hook(tree, &event, ctx) {
            Ok(()) => {}
            Err(ListenerError::Abort) => {
                let discarded = match ctx.application().config().abort_scope {
                    AbortScope::Request => {
                        let remaining = tree.events().len();
                        tree.events_mut().clear();
                        remaining
                    }
                    AbortScope::Phase => tree.events_mut().discard_phase(phase),
                };
                log::debug!(
                    "event processing aborted in {} by {}, discarded {} pending event(s)",
                    phase,
                    event.source,
                    discarded
                );
                outcome = BroadcastOutcome::Aborted;
                break;
            }
            Err(ListenerError::Failure(reason)) => {
                let client_id = tree
                    .node(event.source)
                    .map(|node| node.client_id().to_string())
                    .unwrap_or_default();
                return Err(LifecycleError::Listener { client_id, reason });
            }
        }

        cursor = cursor.min(tree.events().len());
    }

    if ctx.render_response_requested() || ctx.response_complete() {
        let dropped = tree.events().len();
        if dropped > 0 {
            log::debug!("dropping {} pending event(s) for phases that will not run", dropped);
        }
        tree.events_mut().clear();
    }

    Ok(outcome)
}
