//! External model access: named properties behind value bindings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::value::{Value, ValueType};

/// Read/write access to the external model. Calls may be slow and may fail.
pub trait ModelAccess {
    fn get(&self, path: &str) -> Result<Option<Value>, ModelError>;

    fn set(&mut self, path: &str, value: Option<Value>) -> Result<(), ModelError>;

    /// Declared type of the property, when known. Drives default converter lookup.
    fn value_type(&self, path: &str) -> Option<ValueType> {
        let _ = path;
        None
    }
}

/// A node's bound accessor into the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueBinding {
    path: String,
}

impl ValueBinding {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self, model: &dyn ModelAccess) -> Result<Option<Value>, ModelError> {
        model.get(&self.path)
    }

    pub fn set(&self, model: &mut dyn ModelAccess, value: Option<Value>) -> Result<(), ModelError> {
        model.set(&self.path, value)
    }

    pub fn value_type(&self, model: &dyn ModelAccess) -> Option<ValueType> {
        model.value_type(&self.path)
    }
}

#[derive(Clone, Debug, Default)]
struct Property {
    value: Option<Value>,
    value_type: Option<ValueType>,
    read_only: bool,
    reject: Option<String>,
}

/// In-memory model keyed by property path.
///
/// Non-strict models treat unknown paths as null properties and create them on write.
#[derive(Clone, Debug, Default)]
pub struct MapModel {
    properties: BTreeMap<String, Property>,
    strict: bool,
    writes: Vec<(String, Option<Value>)>,
}

impl MapModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown paths fail with [`ModelError::PropertyNotFound`].
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.property(path).value = Some(value.into());
        self
    }

    /// Declare a property with a type and an optional initial value.
    pub fn typed(mut self, path: impl Into<String>, value_type: ValueType, value: Option<Value>) -> Self {
        let property = self.property(path);
        property.value_type = Some(value_type);
        property.value = value;
        self
    }

    pub fn read_only(mut self, path: impl Into<String>) -> Self {
        self.property(path).read_only = true;
        self
    }

    /// Every write to `path` fails with [`ModelError::Rejected`].
    pub fn rejecting(mut self, path: impl Into<String>, reason: impl Into<String>) -> Self {
        self.property(path).reject = Some(reason.into());
        self
    }

    fn property(&mut self, path: impl Into<String>) -> &mut Property {
        self.properties.entry(path.into()).or_default()
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> &[(String, Option<Value>)] {
        &self.writes
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.properties
            .iter()
            .map(|(path, property)| (path.as_str(), property.value.as_ref()))
    }
}

impl ModelAccess for MapModel {
    fn get(&self, path: &str) -> Result<Option<Value>, ModelError> {
        match self.properties.get(path) {
            Some(property) => Ok(property.value.clone()),
            None if self.strict => Err(ModelError::PropertyNotFound(path.to_string())),
            None => Ok(None),
        }
    }

    fn set(&mut self, path: &str, value: Option<Value>) -> Result<(), ModelError> {
        if self.strict && !self.properties.contains_key(path) {
            return Err(ModelError::PropertyNotFound(path.to_string()));
        }
        let property = self.property(path);
        if property.read_only {
            return Err(ModelError::ReadOnly(path.to_string()));
        }
        if let Some(reason) = &property.reject {
            return Err(ModelError::Rejected {
                path: path.to_string(),
                reason: reason.clone(),
            });
        }
        if let (Some(expected), Some(actual)) = (property.value_type, value.as_ref().map(Value::value_type)) {
            if expected != actual {
                return Err(ModelError::TypeMismatch {
                    path: path.to_string(),
                    expected,
                    actual,
                });
            }
        }
        property.value = value.clone();
        self.writes.push((path.to_string(), value));
        Ok(())
    }

    fn value_type(&self, path: &str) -> Option<ValueType> {
        self.properties.get(path).and_then(|property| property.value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_model_creates_on_write() {
        let mut model = MapModel::new();
        assert_eq!(model.get("a.b"), Ok(None));
        model.set("a.b", Some(Value::Int(3))).unwrap();
        assert_eq!(model.get("a.b"), Ok(Some(Value::Int(3))));
        assert_eq!(model.writes().len(), 1);
    }

    #[test]
    fn strict_model_rejects_unknown_paths() {
        let mut model = MapModel::strict().with("known", "x");
        assert!(matches!(model.get("unknown"), Err(ModelError::PropertyNotFound(_))));
        assert!(model.set("unknown", None).is_err());
        assert!(model.set("known", Some(Value::string("y"))).is_ok());
    }

    #[test]
    fn typed_and_guarded_properties() {
        let mut model = MapModel::new()
            .typed("age", ValueType::Int, None)
            .read_only("id")
            .rejecting("email", "mail server down");

        assert_eq!(model.value_type("age"), Some(ValueType::Int));
        assert!(matches!(
            model.set("age", Some(Value::string("x"))),
            Err(ModelError::TypeMismatch { .. })
        ));
        assert_eq!(model.set("id", None), Err(ModelError::ReadOnly("id".to_string())));
        assert!(matches!(model.set("email", None), Err(ModelError::Rejected { .. })));
        assert!(model.writes().is_empty());
    }

    #[test]
    fn binding_delegates_to_model() {
        let mut model = MapModel::new().with("user.name", "ada");
        let binding = ValueBinding::new("user.name");
        assert_eq!(binding.get(&model), Ok(Some(Value::string("ada"))));
        binding.set(&mut model, None).unwrap();
        assert_eq!(binding.get(&model), Ok(None));
    }
}
