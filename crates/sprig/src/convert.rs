//! String-to-value converters.

use std::fmt;

use thiserror::Error;

use crate::message::FacesMessage;
use crate::tree::ComponentNode;
use crate::value::Value;

/// Conversion failure, optionally carrying the message to show instead of the standard one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Error)]
#[error("conversion failed")]
pub struct ConverterError {
    pub message: Option<FacesMessage>,
}

impl ConverterError {
    pub fn with_message(message: FacesMessage) -> Self {
        Self { message: Some(message) }
    }
}

pub trait Converter: Send + Sync + fmt::Debug {
    /// Parse submitted text. An empty string converts to `None`.
    fn as_object(&self, node: &ComponentNode, text: &str) -> Result<Option<Value>, ConverterError>;

    fn as_string(&self, node: &ComponentNode, value: &Value) -> String {
        let _ = node;
        value.to_string()
    }
}

/// Conversion used when no renderer takes over: text goes through `converter` when one
/// was resolved, anything else passes through unchanged.
pub fn default_conversion(
    node: &ComponentNode,
    submitted: &Value,
    converter: Option<&dyn Converter>,
) -> Result<Option<Value>, ConverterError> {
    match (submitted, converter) {
        (Value::String(text), Some(converter)) => converter.as_object(node, text),
        _ => Ok(Some(submitted.clone())),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IntConverter;

impl Converter for IntConverter {
    fn as_object(&self, _node: &ComponentNode, text: &str) -> Result<Option<Value>, ConverterError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<i64>()
            .map(|v| Some(Value::Int(v)))
            .map_err(|_| ConverterError::default())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn as_object(&self, _node: &ComponentNode, text: &str) -> Result<Option<Value>, ConverterError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(Value::Float(v))),
            _ => Err(ConverterError::default()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BoolConverter;

impl Converter for BoolConverter {
    fn as_object(&self, _node: &ComponentNode, text: &str) -> Result<Option<Value>, ConverterError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "on" | "yes" => Ok(Some(Value::Bool(true))),
            "false" | "off" | "no" => Ok(Some(Value::Bool(false))),
            _ => Err(ConverterError::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> ComponentNode {
        ComponentNode::container("n")
    }

    #[test]
    fn int_converter() {
        let n = node();
        assert_eq!(IntConverter.as_object(&n, " 42 "), Ok(Some(Value::Int(42))));
        assert_eq!(IntConverter.as_object(&n, ""), Ok(None));
        assert!(IntConverter.as_object(&n, "abc").is_err());
    }

    #[test]
    fn float_and_bool_converters() {
        let n = node();
        assert_eq!(FloatConverter.as_object(&n, "2.5"), Ok(Some(Value::Float(2.5))));
        assert!(FloatConverter.as_object(&n, "inf").is_err());
        assert_eq!(BoolConverter.as_object(&n, "On"), Ok(Some(Value::Bool(true))));
        assert!(BoolConverter.as_object(&n, "maybe").is_err());
    }

    #[test]
    fn default_conversion_passes_non_text_through() {
        let n = node();
        let list = Value::list([Value::Int(1)]);
        assert_eq!(default_conversion(&n, &list, Some(&IntConverter)), Ok(Some(list.clone())));
        assert_eq!(default_conversion(&n, &Value::string("7"), None), Ok(Some(Value::string("7"))));
        assert_eq!(default_conversion(&n, &Value::string("7"), Some(&IntConverter)), Ok(Some(Value::Int(7))));
    }
}
