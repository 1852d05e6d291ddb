//! Renderer collaborators: per-node decode/convert takeover and whole-response encoding.

use std::fmt::{self, Write as _};

use crate::context::RequestContext;
use crate::convert::{default_conversion, Converter, ConverterError};
use crate::error::HookFailure;
use crate::input::display_value;
use crate::tree::{ComponentNode, ComponentTree, NodeId, NodeKind};
use crate::value::Value;

/// Optional per-node hook that takes over raw input decoding and conversion.
pub trait Renderer: Send + Sync + fmt::Debug {
    /// Raw submitted value for `node`, or `None` when the request carries nothing for it.
    fn decode(&self, node: &ComponentNode, ctx: &RequestContext<'_>) -> Result<Option<Value>, HookFailure> {
        Ok(default_decode(node, ctx))
    }

    fn converted_value(
        &self,
        node: &ComponentNode,
        submitted: &Value,
        converter: Option<&dyn Converter>,
    ) -> Result<Option<Value>, ConverterError> {
        default_conversion(node, submitted, converter)
    }
}

/// The request parameter named by the node's client id.
pub fn default_decode(node: &ComponentNode, ctx: &RequestContext<'_>) -> Option<Value> {
    ctx.param(node.client_id()).cloned()
}

/// Trims surrounding whitespace from textual input.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrimRenderer;

impl Renderer for TrimRenderer {
    fn decode(&self, node: &ComponentNode, ctx: &RequestContext<'_>) -> Result<Option<Value>, HookFailure> {
        Ok(default_decode(node, ctx).map(|value| match value.as_str() {
            Some(text) => Value::string(text.trim()),
            None => value,
        }))
    }
}

/// Checkbox semantics: an absent parameter on a postback means unchecked.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckboxRenderer;

impl Renderer for CheckboxRenderer {
    fn decode(&self, node: &ComponentNode, ctx: &RequestContext<'_>) -> Result<Option<Value>, HookFailure> {
        let checked = match ctx.param(node.client_id()) {
            None => false,
            Some(Value::Bool(checked)) => *checked,
            Some(Value::String(text)) => matches!(&**text, "on" | "true" | "yes"),
            Some(other) => return Err(HookFailure::Renderer(format!("unexpected checkbox value {}", other))),
        };
        Ok(Some(Value::Bool(checked)))
    }
}

/// Encodes the final response from the tree and the request state.
pub trait ResponseRenderer {
    fn render(&mut self, tree: &ComponentTree, ctx: &RequestContext<'_>) -> Result<(), String>;
}

/// Plain-text outline of the rendered tree with each node's value and messages.
#[derive(Debug, Default)]
pub struct OutlineRenderer {
    output: String,
}

impl OutlineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }

    fn node(&mut self, tree: &ComponentTree, id: NodeId, depth: usize, ctx: &RequestContext<'_>) -> Result<(), String> {
        let Some(node) = tree.node(id) else {
            return Ok(());
        };
        if !node.rendered {
            return Ok(());
        }
        let indent = "  ".repeat(depth);
        let value = match &node.kind {
            NodeKind::Container => None,
            NodeKind::Output(output) => output.resolve(ctx.model()).map_err(|e| e.to_string())?,
            NodeKind::Input(_) => display_value(node, ctx.model()).map_err(|e| e.to_string())?,
            NodeKind::Command(command) => command.action.clone().map(Value::from),
        };
        let _ = write!(self.output, "{}{} [{}]", indent, node.client_id(), node.kind.name());
        if let Some(value) = value {
            let _ = write!(self.output, " = {}", value);
        }
        if node.as_input().is_some_and(|input| !input.is_valid()) {
            self.output.push_str(" (invalid)");
        }
        self.output.push('\n');
        for message in ctx.messages().for_client(node.client_id()) {
            let _ = writeln!(self.output, "{}  ! {} {}", indent, message.severity, message.summary);
        }

        for (_, facet) in tree.facets(id) {
            self.node(tree, facet, depth + 1, ctx)?;
        }
        for child in tree.children(id) {
            self.node(tree, *child, depth + 1, ctx)?;
        }
        Ok(())
    }
}

impl ResponseRenderer for OutlineRenderer {
    fn render(&mut self, tree: &ComponentTree, ctx: &RequestContext<'_>) -> Result<(), String> {
        self.output.clear();
        for message in ctx.messages().global() {
            let _ = writeln!(self.output, "! {} {}", message.severity, message.summary);
        }
        self.node(tree, tree.root(), 0, ctx)
    }
}
