//! Editable-value state machine: decode, convert, validate and update-model for input nodes.
//!
//! Value-level failures never surface as `Err`. Conversion and validation problems mark the
//! node invalid and queue a message; a rejected model write is additionally recorded as a
//! deferred error on the request. `Err(HookFailure)` is reserved for unexpected failures such
//! as an unreadable model or an unknown converter id.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::context::RequestContext;
use crate::convert::{default_conversion, Converter};
use crate::error::{HookFailure, ModelError, TreeError};
use crate::event::{EventPayload, FacesEvent};
use crate::message::{FacesMessage, MessageKey};
use crate::model::{ModelAccess, ValueBinding};
use crate::render::default_decode;
use crate::tree::{ComponentNode, ComponentTree, NodeId};
use crate::validate::Validator;
use crate::value::{self, Value};

/// Where an input stands in the current request's pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputState {
    #[default]
    Fresh,
    Decoded,
    Converted,
    Validated,
    Committed,
    /// Absorbing for the rest of the request.
    Invalid,
}

#[derive(Debug)]
pub struct EditableValue {
    pub(crate) submitted_value: Option<Value>,
    pub(crate) local_value: Option<Value>,
    pub(crate) local_value_set: bool,
    pub(crate) valid: bool,
    pub(crate) state: InputState,
    pub required: bool,
    pub immediate: bool,
    pub binding: Option<ValueBinding>,
    pub converter_id: Option<String>,
    pub validators: SmallVec<[Arc<dyn Validator>; 2]>,
    pub required_message: Option<String>,
    pub converter_message: Option<String>,
    pub validator_message: Option<String>,
}

impl Default for EditableValue {
    fn default() -> Self {
        Self {
            submitted_value: None,
            local_value: None,
            local_value_set: false,
            valid: true,
            state: InputState::Fresh,
            required: false,
            immediate: false,
            binding: None,
            converter_id: None,
            validators: SmallVec::new(),
            required_message: None,
            converter_message: None,
            validator_message: None,
        }
    }
}

impl EditableValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn bind(mut self, path: impl Into<String>) -> Self {
        self.binding = Some(ValueBinding::new(path));
        self
    }

    pub fn converter(mut self, id: impl Into<String>) -> Self {
        self.converter_id = Some(id.into());
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn required_message(mut self, text: impl Into<String>) -> Self {
        self.required_message = Some(text.into());
        self
    }

    pub fn converter_message(mut self, text: impl Into<String>) -> Self {
        self.converter_message = Some(text.into());
        self
    }

    pub fn validator_message(mut self, text: impl Into<String>) -> Self {
        self.validator_message = Some(text.into());
        self
    }

    /// Start with a local value that the model has not seen yet.
    pub fn with_local_value(mut self, value: Option<Value>) -> Self {
        self.local_value = value;
        self.local_value_set = true;
        self
    }

    pub fn submitted_value(&self) -> Option<&Value> {
        self.submitted_value.as_ref()
    }

    pub fn set_submitted_value(&mut self, value: Option<Value>) {
        self.submitted_value = value;
    }

    pub fn local_value(&self) -> Option<&Value> {
        self.local_value.as_ref()
    }

    pub fn is_local_value_set(&self) -> bool {
        self.local_value_set
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.state = InputState::Invalid;
    }

    /// Forget all request state: no submitted or local value, valid again.
    pub fn reset_value(&mut self) {
        self.submitted_value = None;
        self.local_value = None;
        self.local_value_set = false;
        self.valid = true;
        self.state = InputState::Fresh;
    }

    /// The node's value: its local value while uncommitted, else the bound model value.
    pub fn current_value(&self, model: &dyn ModelAccess) -> Result<Option<Value>, ModelError> {
        if self.local_value_set {
            return Ok(self.local_value.clone());
        }
        match &self.binding {
            Some(binding) => binding.get(model),
            None => Ok(self.local_value.clone()),
        }
    }
}

/// What rendering shows for `node`: submitted input first, so rejected input is echoed back.
pub fn display_value(node: &ComponentNode, model: &dyn ModelAccess) -> Result<Option<Value>, ModelError> {
    let Some(input) = node.as_input() else {
        return Ok(None);
    };
    match &input.submitted_value {
        Some(submitted) => Ok(Some(submitted.clone())),
        None => input.current_value(model),
    }
}

fn input_mut(tree: &mut ComponentTree, id: NodeId) -> Result<&mut EditableValue, TreeError> {
    tree.node_mut(id)
        .and_then(ComponentNode::as_input_mut)
        .ok_or(TreeError::UnknownNode(id))
}

fn message_for(override_text: Option<&str>, fallback: FacesMessage) -> FacesMessage {
    match override_text {
        Some(text) => FacesMessage::error(text),
        None => fallback,
    }
}

/// Capture raw input for the node. Resets `valid` first, then asks the renderer (or the
/// request parameter of the same client id) for a submitted value.
pub fn decode(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    let node = tree.node_mut(id).ok_or(TreeError::UnknownNode(id))?;
    if let Some(input) = node.as_input_mut() {
        input.valid = true;
        input.state = InputState::Fresh;
    }
    let node = &*node;
    if node.disabled || node.as_input().is_none() {
        return Ok(());
    }

    let submitted = match ctx.application().renderer_for(node) {
        Some(renderer) => renderer.decode(node, ctx)?,
        None => default_decode(node, ctx),
    };
    if let Some(submitted) = submitted {
        log::trace!("decoded `{}` = {}", node.client_id(), submitted);
        let input = input_mut(tree, id)?;
        input.submitted_value = Some(submitted);
        input.state = InputState::Decoded;
    }
    Ok(())
}

/// Resolve the converter for `node`: an explicit converter id must be registered; otherwise
/// the bound property's declared type selects one, if any.
fn resolve_converter(node: &ComponentNode, ctx: &RequestContext<'_>) -> Result<Option<Arc<dyn Converter>>, HookFailure> {
    let Some(input) = node.as_input() else {
        return Ok(None);
    };
    let application = ctx.application();
    if let Some(id) = &input.converter_id {
        return application
            .converter(id)
            .cloned()
            .map(Some)
            .ok_or_else(|| HookFailure::Unresolved {
                kind: "converter",
                id: id.clone(),
            });
    }
    let target = input
        .binding
        .as_ref()
        .and_then(|binding| binding.value_type(ctx.model()));
    Ok(target.and_then(|target| application.converter_for_type(target).cloned()))
}

/// Convert `submitted` to the node's value type.
///
/// On failure the node is marked invalid, a conversion message is queued (node override,
/// then the converter's own message, then the standard one) and `submitted` itself is
/// returned unchanged.
pub fn get_converted_value(
    tree: &mut ComponentTree,
    id: NodeId,
    submitted: &Value,
    ctx: &mut RequestContext<'_>,
) -> Result<Option<Value>, HookFailure> {
    let node = tree.node(id).ok_or(TreeError::UnknownNode(id))?;
    let converter = resolve_converter(node, ctx)?;
    let converted = match ctx.application().renderer_for(node) {
        Some(renderer) => renderer.converted_value(node, submitted, converter.as_deref()),
        None => default_conversion(node, submitted, converter.as_deref()),
    };

    match converted {
        Ok(value) => {
            input_mut(tree, id)?.state = InputState::Converted;
            Ok(value)
        }
        Err(err) => {
            let label = node.display_label();
            let fallback = match err.message {
                Some(message) => message,
                None => ctx.application().config().messages.format(MessageKey::Conversion, &[label]),
            };
            let message = message_for(
                node.as_input().and_then(|input| input.converter_message.as_deref()),
                fallback,
            );
            log::trace!("conversion failed for `{}`: {}", node.client_id(), message.summary);
            ctx.add_message(Some(node.client_id()), message);
            input_mut(tree, id)?.invalidate();
            Ok(Some(submitted.clone()))
        }
    }
}

/// Required check, then attached validators. Only called while the node is still valid.
fn validate_value(tree: &mut ComponentTree, id: NodeId, value: Option<&Value>, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    let node = tree.node(id).ok_or(TreeError::UnknownNode(id))?;
    let Some(input) = node.as_input() else {
        return Ok(());
    };
    let config = ctx.application().config();

    if input.required && value::is_empty(value) {
        let fallback = config.messages.format(MessageKey::Required, &[node.display_label()]);
        let message = message_for(input.required_message.as_deref(), fallback);
        ctx.add_message(Some(node.client_id()), message);
        input_mut(tree, id)?.invalidate();
        return Ok(());
    }

    if value::is_empty(value) && !config.validate_empty_fields {
        return Ok(());
    }
    let mut failed = false;
    for validator in &input.validators {
        if let Err(err) = validator.validate(node, value, &config.messages) {
            let message = message_for(input.validator_message.as_deref(), err.message);
            ctx.add_message(Some(node.client_id()), message);
            failed = true;
        }
    }
    if failed {
        input_mut(tree, id)?.invalidate();
    }
    Ok(())
}

/// Convert and validate the submitted value, then stage it as the local value.
///
/// A value-change event tagged with the current phase is queued when the new value differs
/// from the previous one. Nothing happens when there is no submitted value.
pub fn validate(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    let input = input_mut(tree, id)?;
    let Some(submitted) = input.submitted_value.clone() else {
        return Ok(());
    };

    let empty_as_null = ctx.application().config().interpret_empty_string_as_null
        && matches!(submitted.as_str(), Some(""));
    let converted = if empty_as_null {
        input.submitted_value = None;
        None
    } else {
        get_converted_value(tree, id, &submitted, ctx)?
    };

    if input_mut(tree, id)?.valid {
        validate_value(tree, id, converted.as_ref(), ctx)?;
    }
    let input = input_mut(tree, id)?;
    if !input.valid {
        input.state = InputState::Invalid;
        return Ok(());
    }

    let previous = input.current_value(ctx.model())?;
    input.local_value = converted.clone();
    input.local_value_set = true;
    input.submitted_value = None;
    input.state = InputState::Validated;

    if previous != converted {
        let event = FacesEvent::new(
            id,
            ctx.current_phase(),
            EventPayload::ValueChange {
                old: previous,
                new: converted,
            },
        );
        tree.queue_event(event);
    }
    Ok(())
}

/// Push the local value to the model and clear it. A no-op unless the node is valid, has an
/// uncommitted local value and is bound.
///
/// A rejected write marks the node invalid, queues the update message and records the model
/// error on the request instead of returning it, so sibling updates still run.
pub fn update_model(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    let node = tree.node_mut(id).ok_or(TreeError::UnknownNode(id))?;
    let client_id = node.client_id.clone();
    let label = node.display_label().to_string();
    let Some(input) = node.as_input_mut() else {
        return Ok(());
    };
    if !input.valid || !input.local_value_set {
        return Ok(());
    }
    let Some(binding) = input.binding.clone() else {
        return Ok(());
    };

    match binding.set(ctx.model_mut(), input.local_value.clone()) {
        Ok(()) => {
            log::trace!("committed `{}` to `{}`", client_id, binding.path());
            input.local_value = None;
            input.local_value_set = false;
            input.state = InputState::Committed;
        }
        Err(error) => {
            log::warn!("model update for `{}` failed: {}", client_id, error);
            input.invalidate();
            let message = ctx.application().config().messages.format(MessageKey::Update, &[&label]);
            ctx.add_message(Some(&client_id), message);
            ctx.defer_error(&client_id, error);
        }
    }
    Ok(())
}

/// Run validation now and send the request to render if the node ended up invalid.
fn execute_validate(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    validate(tree, id, ctx)?;
    if !input_mut(tree, id)?.valid {
        ctx.validation_failed();
        ctx.render_response();
    }
    Ok(())
}

pub(crate) fn process_decodes(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    decode(tree, id, ctx)?;
    let immediate = tree.node(id).and_then(ComponentNode::as_input).is_some_and(|input| input.immediate);
    if immediate {
        execute_validate(tree, id, ctx)?;
    }
    Ok(())
}

pub(crate) fn process_validators(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    let immediate = tree.node(id).and_then(ComponentNode::as_input).is_some_and(|input| input.immediate);
    if !immediate {
        execute_validate(tree, id, ctx)?;
    }
    Ok(())
}

pub(crate) fn process_updates(tree: &mut ComponentTree, id: NodeId, ctx: &mut RequestContext<'_>) -> Result<(), HookFailure> {
    update_model(tree, id, ctx)?;
    if !input_mut(tree, id)?.valid {
        ctx.render_response();
    }
    Ok(())
}
