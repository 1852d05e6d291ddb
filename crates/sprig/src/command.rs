//! Command nodes: action sources activated by the request.

use crate::capability::notify_listeners;
use crate::context::RequestContext;
use crate::error::{HookFailure, ListenerError, TreeError};
use crate::event::{EventPayload, FacesEvent, PhaseId};
use crate::render::default_decode;
use crate::tree::{ComponentTree, NodeId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandState {
    /// An immediate command fires during apply-request-values, before validation.
    pub immediate: bool,
    /// Outcome recorded by the default action listener.
    pub action: Option<String>,
}

impl CommandState {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            immediate: false,
            action: Some(action.into()),
        }
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    fn event_phase(&self) -> PhaseId {
        if self.immediate {
            PhaseId::ApplyRequestValues
        } else {
            PhaseId::InvokeApplication
        }
    }
}

/// Queue an action event when the request activated this command.
pub(crate) fn decode(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    let node = tree.node(id).ok_or(TreeError::UnknownNode(id))?;
    let Some(command) = node.as_command() else {
        return Ok(());
    };
    if node.disabled {
        return Ok(());
    }
    let activated = match ctx.application().renderer_for(node) {
        Some(renderer) => renderer.decode(node, ctx)?,
        None => default_decode(node, ctx),
    };
    if activated.is_none() {
        return Ok(());
    }

    log::trace!("command `{}` activated", node.client_id());
    let event = FacesEvent::new(
        id,
        command.event_phase(),
        EventPayload::Action {
            outcome: command.action.clone(),
        },
    );
    tree.queue_event(event);
    Ok(())
}

/// Node listeners first, then the default action listener, which records the outcome
/// and sends the request straight to render.
pub(crate) fn broadcast(
    tree: &mut ComponentTree,
    event: &FacesEvent,
    ctx: &mut RequestContext<'_>,
) -> Result<(), ListenerError> {
    notify_listeners(tree, event, ctx)?;
    if let EventPayload::Action { outcome } = &event.payload {
        ctx.record_outcome(outcome.clone());
        ctx.render_response();
    }
    Ok(())
}
