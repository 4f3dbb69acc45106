use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    /// MediaMonkey (or its automation surface) cannot be reached or created.
    #[error("MediaMonkey unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Menu scope not found: {0}")]
    ScopeNotFound(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The host rejected a call because of its parameter count or shape.
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    /// Whether the failure means the automation surface itself is gone.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AutomationError::Unavailable(_))
    }
}
