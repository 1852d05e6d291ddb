//! Per-request state threaded explicitly through every hook, listener and collaborator.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use sprig_scope::{ScopeContext, ScopeDescriptor};

use crate::application::Application;
use crate::error::ModelError;
use crate::event::PhaseId;
use crate::message::{FacesMessage, Messages};
use crate::model::ModelAccess;
use crate::value::Value;

/// A model error recorded during update-model instead of being returned.
#[derive(Clone, Debug, PartialEq)]
pub struct DeferredError {
    pub client_id: String,
    pub phase: PhaseId,
    pub error: ModelError,
}

pub struct RequestContext<'r> {
    application: &'r Application,
    model: &'r mut dyn ModelAccess,
    params: FxHashMap<String, Value>,
    postback: bool,
    current_phase: PhaseId,
    phases_run: Vec<PhaseId>,
    render_response: bool,
    response_complete: bool,
    validation_failed: bool,
    messages: Messages,
    deferred: Vec<DeferredError>,
    outcome: Option<String>,
    request_scope: ScopeContext,
    session: Option<Arc<ScopeContext>>,
    released: bool,
}

impl<'r> RequestContext<'r> {
    /// An initial (non-postback) request with no parameters.
    pub fn new(application: &'r Application, model: &'r mut dyn ModelAccess) -> Self {
        Self {
            application,
            model,
            params: FxHashMap::default(),
            postback: false,
            current_phase: PhaseId::RestoreView,
            phases_run: Vec::new(),
            render_response: false,
            response_complete: false,
            validation_failed: false,
            messages: Messages::new(),
            deferred: Vec::new(),
            outcome: None,
            request_scope: ScopeContext::new(ScopeDescriptor::request()),
            session: None,
            released: false,
        }
    }

    /// Mark the request as a postback carrying `params`.
    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.postback = true;
        self
    }

    pub fn with_postback(mut self, postback: bool) -> Self {
        self.postback = postback;
        self
    }

    pub fn with_session(mut self, session: Arc<ScopeContext>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn application(&self) -> &'r Application {
        self.application
    }

    pub fn model(&self) -> &dyn ModelAccess {
        &*self.model
    }

    pub fn model_mut(&mut self) -> &mut dyn ModelAccess {
        &mut *self.model
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn is_postback(&self) -> bool {
        self.postback
    }

    pub fn current_phase(&self) -> PhaseId {
        self.current_phase
    }

    pub fn set_current_phase(&mut self, phase: PhaseId) {
        self.current_phase = phase;
    }

    pub(crate) fn enter_phase(&mut self, phase: PhaseId) {
        self.current_phase = phase;
        self.phases_run.push(phase);
    }

    /// Phases entered so far, in order.
    pub fn phases_run(&self) -> &[PhaseId] {
        &self.phases_run
    }

    /// Skip the remaining lifecycle phases and go straight to render.
    pub fn render_response(&mut self) {
        if !self.render_response {
            log::debug!("render response requested during {}", self.current_phase);
        }
        self.render_response = true;
    }

    pub fn render_response_requested(&self) -> bool {
        self.render_response
    }

    /// The response has been produced elsewhere; nothing else runs, not even render.
    pub fn response_complete(&self) -> bool {
        self.response_complete
    }

    pub fn complete_response(&mut self) {
        self.response_complete = true;
    }

    pub fn validation_failed(&mut self) {
        self.validation_failed = true;
    }

    pub fn is_validation_failed(&self) -> bool {
        self.validation_failed
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn add_message(&mut self, client_id: Option<&str>, message: FacesMessage) {
        self.messages.add(client_id, message);
    }

    /// Record a model error for later handling. Only the first occurrence of an error is kept.
    pub fn defer_error(&mut self, client_id: &str, error: ModelError) {
        if self.deferred.iter().any(|deferred| deferred.error == error) {
            log::debug!("model error already deferred: {}", error);
            return;
        }
        self.deferred.push(DeferredError {
            client_id: client_id.to_string(),
            phase: self.current_phase,
            error,
        });
    }

    pub fn deferred_errors(&self) -> &[DeferredError] {
        &self.deferred
    }

    pub fn take_deferred_errors(&mut self) -> Vec<DeferredError> {
        std::mem::take(&mut self.deferred)
    }

    pub fn record_outcome(&mut self, outcome: Option<String>) {
        log::debug!("action outcome: {:?}", outcome);
        self.outcome = outcome;
    }

    pub fn outcome(&self) -> Option<&str> {
        self.outcome.as_deref()
    }

    pub fn request_scope(&self) -> &ScopeContext {
        &self.request_scope
    }

    pub fn session(&self) -> Option<&Arc<ScopeContext>> {
        self.session.as_ref()
    }

    /// End the request: deactivate the request scope and destroy its instances.
    /// Returns the number of destroyed instances. Later calls do nothing.
    pub fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;
        self.request_scope.deactivate();
        self.request_scope.destroy_all()
    }
}

impl Drop for RequestContext<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
