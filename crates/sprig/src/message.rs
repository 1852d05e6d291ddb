//! Message sink: per-client messages queued during a request, read back by rendering.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Message severity. The ordering is part of the contract and survives serialization:
/// a severity is written as its ordinal and recreated from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Info = 0,
    Success = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Success,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.ordinal()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(ordinal: u8) -> Result<Self, String> {
        Severity::from_ordinal(ordinal).ok_or_else(|| format!("invalid severity ordinal {}", ordinal))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacesMessage {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl FacesMessage {
    pub fn new(severity: Severity, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(Severity::Error, text.clone(), text)
    }
}

/// Messages queued for the current request, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Messages {
    entries: Vec<(Option<String>, FacesMessage)>,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for `client_id`, or a global message when `None`.
    pub fn add(&mut self, client_id: Option<&str>, message: FacesMessage) {
        self.entries.push((client_id.map(str::to_string), message));
    }

    pub fn for_client<'a>(&'a self, client_id: &'a str) -> impl Iterator<Item = &'a FacesMessage> + 'a {
        self.entries
            .iter()
            .filter(move |(id, _)| id.as_deref() == Some(client_id))
            .map(|(_, message)| message)
    }

    pub fn global(&self) -> impl Iterator<Item = &FacesMessage> {
        self.entries
            .iter()
            .filter(|(id, _)| id.is_none())
            .map(|(_, message)| message)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &FacesMessage)> {
        self.entries.iter().map(|(id, message)| (id.as_deref(), message))
    }

    pub fn maximum_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|(_, message)| message.severity).max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Standard message keys produced by the pipeline and the built-in validators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Required,
    Conversion,
    Update,
    LengthMinimum,
    LengthMaximum,
    RangeMinimum,
    RangeMaximum,
    RangeType,
    Pattern,
}

impl MessageKey {
    pub const ALL: [MessageKey; 9] = [
        MessageKey::Required,
        MessageKey::Conversion,
        MessageKey::Update,
        MessageKey::LengthMinimum,
        MessageKey::LengthMaximum,
        MessageKey::RangeMinimum,
        MessageKey::RangeMaximum,
        MessageKey::RangeType,
        MessageKey::Pattern,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKey::Required => "REQUIRED",
            MessageKey::Conversion => "CONVERSION",
            MessageKey::Update => "UPDATE",
            MessageKey::LengthMinimum => "LENGTH_MINIMUM",
            MessageKey::LengthMaximum => "LENGTH_MAXIMUM",
            MessageKey::RangeMinimum => "RANGE_MINIMUM",
            MessageKey::RangeMaximum => "RANGE_MAXIMUM",
            MessageKey::RangeType => "RANGE_TYPE",
            MessageKey::Pattern => "PATTERN",
        }
    }

    fn default_template(self) -> MessageTemplate {
        let summary = match self {
            MessageKey::Required => "{0}: Validation Error: Value is required.",
            MessageKey::Conversion => "{0}: Conversion error occurred.",
            MessageKey::Update => "{0}: An error occurred when processing your submitted information.",
            MessageKey::LengthMinimum => "{0}: Validation Error: Length is less than allowable minimum of '{1}'",
            MessageKey::LengthMaximum => "{0}: Validation Error: Length is greater than allowable maximum of '{1}'",
            MessageKey::RangeMinimum => "{0}: Validation Error: Value is less than allowable minimum of '{1}'",
            MessageKey::RangeMaximum => "{0}: Validation Error: Value is greater than allowable maximum of '{1}'",
            MessageKey::RangeType => "{0}: Validation Error: Value is not of the correct type.",
            MessageKey::Pattern => "{0}: Validation Error: Value does not match pattern '{1}'",
        };
        MessageTemplate {
            summary: summary.to_string(),
            detail: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageTemplate {
    pub summary: String,
    /// Falls back to the summary when absent.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Keyed message templates with positional `{n}` placeholders.
///
/// Deserializes from a table of overrides layered on top of the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, MessageTemplate>")]
pub struct MessageBundle {
    templates: HashMap<String, MessageTemplate>,
}

impl MessageBundle {
    pub fn set(&mut self, key: MessageKey, template: MessageTemplate) {
        self.templates.insert(key.as_str().to_string(), template);
    }

    /// Build an error message for `key` with positional arguments.
    pub fn format(&self, key: MessageKey, args: &[&str]) -> FacesMessage {
        let template = self
            .templates
            .get(key.as_str())
            .cloned()
            .unwrap_or_else(|| key.default_template());
        let summary = substitute(&template.summary, args);
        let detail = match &template.detail {
            Some(detail) => substitute(detail, args),
            None => summary.clone(),
        };
        FacesMessage::new(Severity::Error, summary, detail)
    }
}

impl Default for MessageBundle {
    fn default() -> Self {
        let templates = MessageKey::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), key.default_template()))
            .collect();
        Self { templates }
    }
}

impl From<HashMap<String, MessageTemplate>> for MessageBundle {
    fn from(overrides: HashMap<String, MessageTemplate>) -> Self {
        let mut bundle = Self::default();
        bundle.templates.extend(overrides);
        bundle
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\d+)\}").expect("valid placeholder pattern"));

/// Replace `{N}` with `args[N]` in one pass; argument text is never rescanned.
/// Placeholders without a matching argument are kept.
fn substitute(template: &str, args: &[&str]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .map_or_else(|| caps[0].to_string(), |arg| arg.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_are_totally_ordered() {
        assert!(Severity::Info < Severity::Success);
        assert!(Severity::Success < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn severity_round_trips_through_ordinal() {
        for severity in Severity::ALL {
            let json = serde_json::to_string(&severity).unwrap();
            assert_eq!(json, severity.ordinal().to_string());
            let back: Severity = serde_json::from_str(&json).unwrap();
            assert_eq!(back, severity);
        }
        assert!(serde_json::from_str::<Severity>("9").is_err());
    }

    #[test]
    fn maximum_severity_and_client_filtering() {
        let mut messages = Messages::new();
        assert_eq!(messages.maximum_severity(), None);

        messages.add(Some("form:name"), FacesMessage::new(Severity::Warn, "w", "w"));
        messages.add(None, FacesMessage::new(Severity::Info, "i", "i"));
        messages.add(Some("form:age"), FacesMessage::error("e"));

        assert_eq!(messages.maximum_severity(), Some(Severity::Error));
        assert_eq!(messages.for_client("form:name").count(), 1);
        assert_eq!(messages.global().next().map(|m| m.summary.as_str()), Some("i"));
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn arguments_are_not_rescanned_for_placeholders() {
        let bundle = MessageBundle::default();
        let msg = bundle.format(MessageKey::Required, &["Field {1}", "x"]);
        assert_eq!(msg.summary, "Field {1}: Validation Error: Value is required.");
        assert_eq!(substitute("{0} of {1} ({2})", &["a", "b"]), "a of b ({2})");
    }

    #[test]
    fn bundle_formats_and_overrides() {
        let bundle = MessageBundle::default();
        let msg = bundle.format(MessageKey::Required, &["Name"]);
        assert_eq!(msg.summary, "Name: Validation Error: Value is required.");
        assert_eq!(msg.detail, msg.summary);

        let mut overrides = HashMap::new();
        overrides.insert(
            "REQUIRED".to_string(),
            MessageTemplate {
                summary: "{0} is mandatory".to_string(),
                detail: Some("Please fill in {0}".to_string()),
            },
        );
        let bundle = MessageBundle::from(overrides);
        let msg = bundle.format(MessageKey::Required, &["Name"]);
        assert_eq!(msg.summary, "Name is mandatory");
        assert_eq!(msg.detail, "Please fill in Name");
        // Untouched keys keep their defaults.
        let conversion = bundle.format(MessageKey::Conversion, &["Age"]);
        assert_eq!(conversion.summary, "Age: Conversion error occurred.");
    }
}
