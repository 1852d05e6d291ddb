use thiserror::Error;

/// Errors raised while resolving or creating contextual instances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("scope `{scope}` is not active")]
    ContextNotActive { scope: String },
    #[error("failed to create contextual instance {contextual}: {reason}")]
    Creation { contextual: String, reason: String },
    #[error("contextual instance {contextual} is not a `{expected}`")]
    TypeMismatch {
        contextual: String,
        expected: &'static str,
    },
}

impl ScopeError {
    pub fn creation(contextual: impl ToString, reason: impl ToString) -> Self {
        Self::Creation {
            contextual: contextual.to_string(),
            reason: reason.to_string(),
        }
    }
}
