//! Phase orchestrator: walks the tree through the ordered phases of one request.

use smallvec::SmallVec;

use crate::capability::{Capabilities, PhaseHook};
use crate::context::RequestContext;
use crate::error::LifecycleError;
use crate::event::{self, BroadcastOutcome, PhaseId};
use crate::render::ResponseRenderer;
use crate::tree::{ComponentTree, NodeId};

/// Observer notified around phases. `phase()` selects which phases; `Any` means all.
pub trait PhaseListener: Send + Sync {
    fn phase(&self) -> PhaseId {
        PhaseId::Any
    }

    fn before_phase(&self, phase: PhaseId, ctx: &mut RequestContext<'_>) {
        let _ = (phase, ctx);
    }

    fn after_phase(&self, phase: PhaseId, ctx: &mut RequestContext<'_>) {
        let _ = (phase, ctx);
    }
}

/// The per-node hook a phase runs, if it walks the tree at all.
fn phase_hook(capabilities: &Capabilities, phase: PhaseId) -> Option<PhaseHook> {
    match phase {
        PhaseId::ApplyRequestValues => Some(capabilities.decode),
        PhaseId::ProcessValidations => Some(capabilities.validate),
        PhaseId::UpdateModelValues => Some(capabilities.update),
        _ => None,
    }
}

fn walks_tree(phase: PhaseId) -> bool {
    matches!(
        phase,
        PhaseId::ApplyRequestValues | PhaseId::ProcessValidations | PhaseId::UpdateModelValues
    )
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Lifecycle;

impl Lifecycle {
    pub fn new() -> Self {
        Self
    }

    /// Run restore-view through invoke-application, stopping early once render-now or
    /// response-complete is set. An initial request goes straight to render.
    pub fn execute(&self, tree: &mut ComponentTree, ctx: &mut RequestContext<'_>) -> Result<(), LifecycleError> {
        for phase in PhaseId::EXECUTE {
            if ctx.render_response_requested() || ctx.response_complete() {
                log::debug!("skipping {} and later phases", phase);
                break;
            }
            self.run_phase(phase, tree, ctx)?;
        }
        Ok(())
    }

    /// Run one phase: before-listeners, the per-node hook over the rendered tree, the
    /// broadcaster, after-listeners.
    ///
    /// A failing hook or listener forces render-now before the error is returned, so the
    /// request can still produce a response. Once render-now or response-complete is set,
    /// events still queued are dropped whether or not the phase failed.
    pub fn run_phase(
        &self,
        phase: PhaseId,
        tree: &mut ComponentTree,
        ctx: &mut RequestContext<'_>,
    ) -> Result<(), LifecycleError> {
        log::debug!("entering {}", phase);
        ctx.enter_phase(phase);
        self.notify_before(phase, ctx);

        let result = self.phase_body(phase, tree, ctx);
        if let Err(err) = &result {
            log::warn!("{} failed: {}", phase, err);
            ctx.render_response();
        }

        self.notify_after(phase, ctx);
        if ctx.render_response_requested() || ctx.response_complete() {
            let dropped = tree.events().len();
            if dropped > 0 {
                log::debug!("{} left {} pending event(s), dropping them", phase, dropped);
                tree.events_mut().clear();
            }
        }
        result
    }

    fn phase_body(&self, phase: PhaseId, tree: &mut ComponentTree, ctx: &mut RequestContext<'_>) -> Result<(), LifecycleError> {
        if phase == PhaseId::RestoreView {
            if !ctx.is_postback() {
                ctx.render_response();
            }
            return Ok(());
        }
        if walks_tree(phase) {
            let root = tree.root();
            walk(tree, root, phase, ctx)?;
        }
        if event::broadcast(tree, phase, ctx)? == BroadcastOutcome::Aborted {
            log::debug!("{} finished with aborted event processing", phase);
        }
        Ok(())
    }

    /// Render through `renderer`, unless the response is already complete.
    pub fn render(
        &self,
        tree: &mut ComponentTree,
        ctx: &mut RequestContext<'_>,
        renderer: &mut dyn ResponseRenderer,
    ) -> Result<(), LifecycleError> {
        if ctx.response_complete() {
            log::debug!("response already complete, not rendering");
            return Ok(());
        }
        let phase = PhaseId::RenderResponse;
        log::debug!("entering {}", phase);
        ctx.enter_phase(phase);
        self.notify_before(phase, ctx);
        let result = renderer.render(tree, ctx).map_err(LifecycleError::Render);
        self.notify_after(phase, ctx);
        result
    }

    /// Execute then render. Render still runs after a failed execute, and the execute
    /// error wins.
    pub fn process(
        &self,
        tree: &mut ComponentTree,
        ctx: &mut RequestContext<'_>,
        renderer: &mut dyn ResponseRenderer,
    ) -> Result<(), LifecycleError> {
        let executed = self.execute(tree, ctx);
        let rendered = self.render(tree, ctx, renderer);
        executed.and(rendered)
    }

    fn notify_before(&self, phase: PhaseId, ctx: &mut RequestContext<'_>) {
        for listener in ctx.application().phase_listeners() {
            if listener.phase().matches(phase) {
                listener.before_phase(phase, ctx);
            }
        }
    }

    fn notify_after(&self, phase: PhaseId, ctx: &mut RequestContext<'_>) {
        for listener in ctx.application().phase_listeners() {
            if listener.phase().matches(phase) {
                listener.after_phase(phase, ctx);
            }
        }
    }
}

/// Pre-order walk: the node, then its facets, then its children. A non-rendered node
/// skips its whole subtree.
fn walk(
    tree: &mut ComponentTree,
    id: NodeId,
    phase: PhaseId,
    ctx: &mut RequestContext<'_>,
) -> Result<(), LifecycleError> {
    let Some(node) = tree.node(id) else {
        return Ok(());
    };
    if !node.rendered {
        log::trace!("{}: skipping non-rendered `{}`", phase, node.client_id());
        return Ok(());
    }
    let Some(hook) = phase_hook(node.kind.capabilities(), phase) else {
        return Ok(());
    };

    if let Err(source) = hook(tree, id, ctx) {
        let client_id = tree
            .node(id)
            .map(|node| node.client_id().to_string())
            .unwrap_or_default();
        return Err(LifecycleError::Hook {
            phase,
            client_id,
            source,
        });
    }

    let next: SmallVec<[NodeId; 8]> = match tree.node(id) {
        Some(node) => node.facets.values().chain(node.children.iter()).copied().collect(),
        None => return Ok(()),
    };
    for child in next {
        walk(tree, child, phase, ctx)?;
    }
    Ok(())
}
