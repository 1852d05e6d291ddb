//! Application-wide registries shared by every request.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use sprig_scope::{ScopeContext, ScopeDescriptor};

use crate::config::LifecycleConfig;
use crate::convert::{BoolConverter, Converter, FloatConverter, IntConverter};
use crate::lifecycle::PhaseListener;
use crate::render::{CheckboxRenderer, Renderer, TrimRenderer};
use crate::tree::ComponentNode;
use crate::validate::Validator;
use crate::value::ValueType;

pub struct Application {
    config: LifecycleConfig,
    converters_by_type: FxHashMap<ValueType, Arc<dyn Converter>>,
    converters: FxHashMap<String, Arc<dyn Converter>>,
    validators: FxHashMap<String, Arc<dyn Validator>>,
    renderers: FxHashMap<String, Arc<dyn Renderer>>,
    phase_listeners: Vec<Arc<dyn PhaseListener>>,
    scope: ScopeContext,
}

impl Application {
    /// An application with the built-in converters and renderers registered.
    pub fn new(config: LifecycleConfig) -> Self {
        let mut application = Self {
            config,
            converters_by_type: FxHashMap::default(),
            converters: FxHashMap::default(),
            validators: FxHashMap::default(),
            renderers: FxHashMap::default(),
            phase_listeners: Vec::new(),
            scope: ScopeContext::new(ScopeDescriptor::application()),
        };
        let int: Arc<dyn Converter> = Arc::new(IntConverter);
        let float: Arc<dyn Converter> = Arc::new(FloatConverter);
        let boolean: Arc<dyn Converter> = Arc::new(BoolConverter);
        for (value_type, id, converter) in [
            (ValueType::Int, "int", int),
            (ValueType::Float, "float", float),
            (ValueType::Bool, "bool", boolean),
        ] {
            application.register_converter(id, converter.clone());
            application.register_converter_for_type(value_type, converter);
        }
        application.register_renderer("trim", Arc::new(TrimRenderer));
        application.register_renderer("checkbox", Arc::new(CheckboxRenderer));
        application
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn register_converter(&mut self, id: impl Into<String>, converter: Arc<dyn Converter>) {
        self.converters.insert(id.into(), converter);
    }

    pub fn register_converter_for_type(&mut self, value_type: ValueType, converter: Arc<dyn Converter>) {
        self.converters_by_type.insert(value_type, converter);
    }

    pub fn converter(&self, id: &str) -> Option<&Arc<dyn Converter>> {
        self.converters.get(id)
    }

    pub fn converter_for_type(&self, value_type: ValueType) -> Option<&Arc<dyn Converter>> {
        self.converters_by_type.get(&value_type)
    }

    /// Register a shared validator that tree builders can attach by id.
    pub fn register_validator(&mut self, id: impl Into<String>, validator: Arc<dyn Validator>) {
        self.validators.insert(id.into(), validator);
    }

    pub fn validator(&self, id: &str) -> Option<&Arc<dyn Validator>> {
        self.validators.get(id)
    }

    pub fn register_renderer(&mut self, renderer_type: impl Into<String>, renderer: Arc<dyn Renderer>) {
        self.renderers.insert(renderer_type.into(), renderer);
    }

    pub fn renderer(&self, renderer_type: &str) -> Option<&Arc<dyn Renderer>> {
        self.renderers.get(renderer_type)
    }

    /// The renderer `node` asks for. An unregistered renderer type falls back to default
    /// decoding with a warning.
    pub fn renderer_for(&self, node: &ComponentNode) -> Option<&Arc<dyn Renderer>> {
        let renderer_type = node.renderer_type.as_deref()?;
        let renderer = self.renderers.get(renderer_type);
        if renderer.is_none() {
            log::warn!("no renderer `{}` for `{}`", renderer_type, node.client_id());
        }
        renderer
    }

    pub fn add_phase_listener(&mut self, listener: Arc<dyn PhaseListener>) {
        self.phase_listeners.push(listener);
    }

    pub fn phase_listeners(&self) -> &[Arc<dyn PhaseListener>] {
        &self.phase_listeners
    }

    /// Application-wide scope, shared by concurrent requests.
    pub fn scope(&self) -> &ScopeContext {
        &self.scope
    }

    /// Deactivate the application scope and destroy its instances.
    pub fn shutdown(&self) -> usize {
        self.scope.deactivate();
        self.scope.destroy_all()
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}
