//! Error types for schema construction and schema-author callbacks.

/// Errors raised while parsing a schema from its JSON representation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The top-level schema document is not a JSON array of nodes.
    #[error("schema must be a JSON array of field nodes")]
    NotAnArray,

    /// A field node is structurally invalid (missing name, wrong shape, ...).
    #[error("invalid schema node at index {index}: {message}")]
    InvalidNode { index: usize, message: String },

    /// A condition expression is structurally invalid.
    #[error("invalid condition for field '{field}': {message}")]
    InvalidCondition { field: String, message: String },

    /// A linkage effect is structurally invalid.
    #[error("invalid effect for field '{field}': {message}")]
    InvalidEffect { field: String, message: String },

    /// A validation rule is structurally invalid.
    #[error("invalid rule for field '{field}': {message}")]
    InvalidRule { field: String, message: String },
}

/// Error returned by schema-author callbacks (generators, prop functions,
/// custom predicates, effect functions, validators, option loaders).
///
/// The engine never propagates these: every call site catches the error,
/// logs it, and degrades to "no contribution" for that callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        CallbackError(message.into())
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        CallbackError(message.to_string())
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        CallbackError(message)
    }
}
