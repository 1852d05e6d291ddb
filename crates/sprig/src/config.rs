use serde::Deserialize;

use crate::message::MessageBundle;

/// How much of the event queue an aborting listener discards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortScope {
    /// Only events still due in the phase being broadcast.
    Phase,
    /// Every pending event of the request.
    #[default]
    Request,
}

/// Lifecycle behavior switches, shared by every request of an [`Application`](crate::Application).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleConfig {
    pub abort_scope: AbortScope,
    /// A submitted `""` is treated as an absent value before conversion.
    pub interpret_empty_string_as_null: bool,
    /// Run attached validators on empty values as well.
    pub validate_empty_fields: bool,
    pub messages: MessageBundle,
}
