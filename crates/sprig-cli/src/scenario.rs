//! Scenario files (TOML): a model, a component tree and one request to run against them.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use sprig::{
    Application, CommandState, ComponentNode, ComponentTree, EditableValue, LengthValidator, LifecycleConfig,
    MapModel, NodeId, OutputState, PatternValidator, RangeValidator, Validator, Value, ValueType,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub config: LifecycleConfig,

    /// Client id of the tree root
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default)]
    pub model: ModelSpec,

    /// Shared validators, attached to inputs by id
    #[serde(default)]
    pub validators: BTreeMap<String, ValidatorSpec>,

    /// Nodes in document order; a parent must appear before its children
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeSpec>,

    #[serde(default)]
    pub request: RequestSpec,
}

fn default_root() -> String {
    "view".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    /// Unknown properties fail instead of reading as empty
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    #[serde(default)]
    pub types: BTreeMap<String, ValueType>,
    #[serde(default)]
    pub read_only: Vec<String>,
    /// Property path -> reason every write is rejected with
    #[serde(default)]
    pub reject: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum ValidatorSpec {
    Length { min: Option<usize>, max: Option<usize> },
    Range { min: Option<f64>, max: Option<f64> },
    Pattern { pattern: String },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindSpec {
    #[default]
    Container,
    Output,
    Input,
    Command,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub kind: KindSpec,
    /// Parent client id; the root when absent
    pub parent: Option<String>,
    /// Attach as this facet of the parent instead of as a child
    pub facet: Option<String>,
    pub label: Option<String>,
    pub rendered: Option<bool>,
    #[serde(default)]
    pub disabled: bool,
    pub renderer: Option<String>,

    // Output and input
    pub bind: Option<String>,
    pub value: Option<Value>,

    // Input
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub immediate: bool,
    pub converter: Option<String>,
    #[serde(default)]
    pub validators: Vec<String>,
    pub required_message: Option<String>,
    pub converter_message: Option<String>,
    pub validator_message: Option<String>,

    // Command
    pub action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSpec {
    /// Defaults to true when any parameter is given
    pub postback: Option<bool>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Application with the built-ins plus this scenario's shared validators.
    pub fn application(&self) -> Result<Application> {
        let mut application = Application::new(self.config.clone());
        for (id, spec) in &self.validators {
            let validator = spec.build().with_context(|| format!("validator `{}`", id))?;
            application.register_validator(id.clone(), validator);
        }
        Ok(application)
    }

    pub fn model(&self) -> MapModel {
        let spec = &self.model;
        let mut model = if spec.strict { MapModel::strict() } else { MapModel::new() };
        for (path, value_type) in &spec.types {
            model = model.typed(path.clone(), *value_type, spec.values.get(path).cloned());
        }
        for (path, value) in &spec.values {
            if !spec.types.contains_key(path) {
                model = model.with(path.clone(), value.clone());
            }
        }
        for path in &spec.read_only {
            model = model.read_only(path.clone());
        }
        for (path, reason) in &spec.reject {
            model = model.rejecting(path.clone(), reason.clone());
        }
        model
    }

    /// Build the tree, resolving parents, validators, converters and renderers against
    /// `application`.
    pub fn tree(&self, application: &Application) -> Result<ComponentTree> {
        let mut tree = ComponentTree::new(ComponentNode::container(self.root.clone()));
        for spec in &self.nodes {
            let parent = match &spec.parent {
                Some(parent) => tree
                    .find(parent)
                    .ok_or_else(|| anyhow!("node `{}`: unknown parent `{}`", spec.id, parent))?,
                None => tree.root(),
            };
            let node = spec
                .build(application)
                .with_context(|| format!("node `{}`", spec.id))?;
            let attached: Result<NodeId, _> = match &spec.facet {
                Some(name) => tree.add_facet(parent, name.clone(), node),
                None => tree.add_child(parent, node),
            };
            attached.with_context(|| format!("node `{}`", spec.id))?;
        }
        Ok(tree)
    }

    pub fn is_postback(&self) -> bool {
        self.request
            .postback
            .unwrap_or(!self.request.params.is_empty())
    }
}

impl ValidatorSpec {
    fn build(&self) -> Result<Arc<dyn Validator>> {
        Ok(match self {
            ValidatorSpec::Length { min, max } => Arc::new(LengthValidator { min: *min, max: *max }),
            ValidatorSpec::Range { min, max } => Arc::new(RangeValidator { min: *min, max: *max }),
            ValidatorSpec::Pattern { pattern } => Arc::new(PatternValidator::new(pattern)?),
        })
    }
}

impl NodeSpec {
    fn build(&self, application: &Application) -> Result<ComponentNode> {
        let mut node = match self.kind {
            KindSpec::Container => ComponentNode::container(self.id.clone()),
            KindSpec::Output => {
                let state = match (&self.bind, &self.value) {
                    (Some(path), _) => OutputState::bound(path.clone()),
                    (None, Some(value)) => OutputState::fixed(value.clone()),
                    (None, None) => OutputState::default(),
                };
                ComponentNode::output(self.id.clone(), state)
            }
            KindSpec::Input => ComponentNode::input(self.id.clone(), self.editable_value(application)?),
            KindSpec::Command => {
                let mut state = CommandState::default().immediate(self.immediate);
                state.action = self.action.clone();
                ComponentNode::command(self.id.clone(), state)
            }
        };

        if let Some(label) = &self.label {
            node = node.with_label(label.clone());
        }
        if let Some(rendered) = self.rendered {
            node = node.with_rendered(rendered);
        }
        node = node.with_disabled(self.disabled);
        if let Some(renderer) = &self.renderer {
            if application.renderer(renderer).is_none() {
                bail!("unknown renderer `{}`", renderer);
            }
            node = node.with_renderer(renderer.clone());
        }
        Ok(node)
    }

    fn editable_value(&self, application: &Application) -> Result<EditableValue> {
        let mut value = EditableValue::new()
            .required(self.required)
            .immediate(self.immediate);
        if let Some(path) = &self.bind {
            value = value.bind(path.clone());
        }
        if let Some(converter) = &self.converter {
            if application.converter(converter).is_none() {
                bail!("unknown converter `{}`", converter);
            }
            value = value.converter(converter.clone());
        }
        for id in &self.validators {
            let validator = application
                .validator(id)
                .ok_or_else(|| anyhow!("unknown validator `{}`", id))?;
            value = value.validator(validator.clone());
        }
        if let Some(text) = &self.required_message {
            value = value.required_message(text.clone());
        }
        if let Some(text) = &self.converter_message {
            value = value.converter_message(text.clone());
        }
        if let Some(text) = &self.validator_message {
            value = value.validator_message(text.clone());
        }
        if self.value.is_some() {
            log::warn!("input `{}`: `value` is ignored, bind a model property instead", self.id);
        }
        Ok(value)
    }
}
