//! Per-kind phase hooks, dispatched through static tables instead of a node hierarchy.

use smallvec::SmallVec;

use crate::command;
use crate::context::RequestContext;
use crate::error::{HookFailure, ListenerError};
use crate::event::FacesEvent;
use crate::input;
use crate::tree::{ComponentTree, Listener, NodeId, NodeKind};

pub type PhaseHook = fn(&mut ComponentTree, NodeId, &mut RequestContext<'_>) -> Result<(), HookFailure>;

pub type BroadcastHook = fn(&mut ComponentTree, &FacesEvent, &mut RequestContext<'_>) -> Result<(), ListenerError>;

pub struct Capabilities {
    /// Apply-request-values.
    pub decode: PhaseHook,
    /// Process-validations.
    pub validate: PhaseHook,
    /// Update-model-values.
    pub update: PhaseHook,
    pub broadcast: BroadcastHook,
}

static CONTAINER: Capabilities = Capabilities {
    decode: noop,
    validate: noop,
    update: noop,
    broadcast: notify_listeners,
};

static OUTPUT: Capabilities = Capabilities {
    decode: noop,
    validate: noop,
    update: noop,
    broadcast: notify_listeners,
};

static INPUT: Capabilities = Capabilities {
    decode: input::process_decodes,
    validate: input::process_validators,
    update: input::process_updates,
    broadcast: notify_listeners,
};

static COMMAND: Capabilities = Capabilities {
    decode: command::decode,
    validate: noop,
    update: noop,
    broadcast: command::broadcast,
};

impl NodeKind {
    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            NodeKind::Container => &CONTAINER,
            NodeKind::Output(_) => &OUTPUT,
            NodeKind::Input(_) => &INPUT,
            NodeKind::Command(_) => &COMMAND,
        }
    }
}

fn noop(_tree: &mut ComponentTree, _id: NodeId, _ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    Ok(())
}

/// Deliver `event` to the source node's listeners that accept it, in registration order.
/// Stops at the first listener error.
pub fn notify_listeners(
    tree: &mut ComponentTree,
    event: &FacesEvent,
    ctx: &mut RequestContext<'_>,
) -> Result<(), ListenerError> {
    // Listeners may mutate the tree, so take them out of the node first.
    let listeners: SmallVec<[Listener; 2]> = match tree.node(event.source) {
        Some(node) => node
            .listeners()
            .iter()
            .filter(|listener| listener.kind.accepts(&event.payload))
            .cloned()
            .collect(),
        None => return Ok(()),
    };
    for listener in listeners {
        (listener.callback)(tree, event, ctx)?;
    }
    Ok(())
}
