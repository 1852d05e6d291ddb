//! Pluggable value validators and the built-in length, range and pattern checks.

use std::fmt;

use regex::Regex;
use thiserror::Error;

use crate::message::{FacesMessage, MessageBundle, MessageKey};
use crate::tree::ComponentNode;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", message.summary)]
pub struct ValidatorError {
    pub message: FacesMessage,
}

impl From<FacesMessage> for ValidatorError {
    fn from(message: FacesMessage) -> Self {
        Self { message }
    }
}

/// Checks a converted value. Validators only see empty values when the application
/// enables `validate_empty_fields`; the built-ins accept `None`.
pub trait Validator: Send + Sync + fmt::Debug {
    fn validate(&self, node: &ComponentNode, value: Option<&Value>, bundle: &MessageBundle) -> Result<(), ValidatorError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for LengthValidator {
    fn validate(&self, node: &ComponentNode, value: Option<&Value>, bundle: &MessageBundle) -> Result<(), ValidatorError> {
        let length = match value {
            None => return Ok(()),
            Some(Value::String(text)) => text.chars().count(),
            Some(Value::List(items)) => items.len(),
            Some(other) => other.to_string().chars().count(),
        };
        let label = node.display_label();
        if let Some(min) = self.min.filter(|min| length < *min) {
            return Err(bundle.format(MessageKey::LengthMinimum, &[label, &min.to_string()]).into());
        }
        if let Some(max) = self.max.filter(|max| length > *max) {
            return Err(bundle.format(MessageKey::LengthMaximum, &[label, &max.to_string()]).into());
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for RangeValidator {
    fn validate(&self, node: &ComponentNode, value: Option<&Value>, bundle: &MessageBundle) -> Result<(), ValidatorError> {
        let Some(value) = value else {
            return Ok(());
        };
        let label = node.display_label();
        let number = value
            .as_f64()
            .or_else(|| value.as_str().and_then(|text| text.trim().parse::<f64>().ok()));
        let Some(number) = number else {
            return Err(bundle.format(MessageKey::RangeType, &[label]).into());
        };
        if let Some(min) = self.min.filter(|min| number < *min) {
            return Err(bundle.format(MessageKey::RangeMinimum, &[label, &min.to_string()]).into());
        }
        if let Some(max) = self.max.filter(|max| number > *max) {
            return Err(bundle.format(MessageKey::RangeMaximum, &[label, &max.to_string()]).into());
        }
        Ok(())
    }
}

/// Whole-value regular expression match on textual values.
#[derive(Clone, Debug)]
pub struct PatternValidator {
    pattern: String,
    regex: Regex,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Validator for PatternValidator {
    fn validate(&self, node: &ComponentNode, value: Option<&Value>, bundle: &MessageBundle) -> Result<(), ValidatorError> {
        let Some(value) = value else {
            return Ok(());
        };
        let text = value.to_string();
        if self.regex.is_match(&text) {
            Ok(())
        } else {
            Err(bundle
                .format(MessageKey::Pattern, &[node.display_label(), &self.pattern])
                .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> ComponentNode {
        ComponentNode::container("f").with_label("Code")
    }

    #[test]
    fn length_bounds() {
        let bundle = MessageBundle::default();
        let v = LengthValidator { min: Some(2), max: Some(4) };
        assert!(v.validate(&field(), Some(&Value::string("abc")), &bundle).is_ok());
        assert!(v.validate(&field(), None, &bundle).is_ok());

        let err = v.validate(&field(), Some(&Value::string("a")), &bundle).unwrap_err();
        assert_eq!(
            err.message.summary,
            "Code: Validation Error: Length is less than allowable minimum of '2'"
        );
        assert!(v.validate(&field(), Some(&Value::string("abcde")), &bundle).is_err());
    }

    #[test]
    fn range_checks_type_and_bounds() {
        let bundle = MessageBundle::default();
        let v = RangeValidator { min: Some(0.0), max: Some(10.0) };
        assert!(v.validate(&field(), Some(&Value::Int(5)), &bundle).is_ok());
        assert!(v.validate(&field(), Some(&Value::Int(11)), &bundle).is_err());

        let err = v.validate(&field(), Some(&Value::Bool(true)), &bundle).unwrap_err();
        assert_eq!(err.message.summary, "Code: Validation Error: Value is not of the correct type.");
    }

    #[test]
    fn pattern_matches_the_whole_value() {
        let bundle = MessageBundle::default();
        let v = PatternValidator::new("[a-z]+").unwrap();
        assert!(v.validate(&field(), Some(&Value::string("abc")), &bundle).is_ok());
        assert!(v.validate(&field(), Some(&Value::string("abc1")), &bundle).is_err());
        assert!(PatternValidator::new("(").is_err());
    }
}
