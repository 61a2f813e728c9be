//! Validation rule model.
//!
//! Rules are consumed by the runtime's validator: static rules attached to a
//! field descriptor plus dynamic rules produced by its linkage config. A rule
//! with no recognized kind and no `required` flag validates nothing.

use std::fmt;
use std::sync::Arc;

use crate::error::CallbackError;
use crate::value::ValueMap;

/// Custom validator: receives the field value and the full value map.
/// `Err` fails validation with the error's message (or the rule's `message`).
pub type ValidatorFn =
    Arc<dyn Fn(&serde_json::Value, &ValueMap) -> Result<(), CallbackError> + Send + Sync>;

/// Recognized rule kinds. `required` can also be expressed via the flag on
/// [`Rule`] without a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Required,
    Email,
    Phone,
    Url,
    Number,
    Min,
    Max,
    Len,
    Pattern,
    Custom,
}

impl RuleKind {
    pub fn parse(s: &str) -> Option<RuleKind> {
        match s {
            "required" => Some(RuleKind::Required),
            "email" => Some(RuleKind::Email),
            "phone" => Some(RuleKind::Phone),
            "url" => Some(RuleKind::Url),
            "number" => Some(RuleKind::Number),
            "min" => Some(RuleKind::Min),
            "max" => Some(RuleKind::Max),
            "len" => Some(RuleKind::Len),
            "pattern" => Some(RuleKind::Pattern),
            "custom" => Some(RuleKind::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::Email => "email",
            RuleKind::Phone => "phone",
            RuleKind::Url => "url",
            RuleKind::Number => "number",
            RuleKind::Min => "min",
            RuleKind::Max => "max",
            RuleKind::Len => "len",
            RuleKind::Pattern => "pattern",
            RuleKind::Custom => "custom",
        }
    }
}

/// One validation rule. Fields not relevant to the rule's kind are ignored.
#[derive(Clone, Default)]
pub struct Rule {
    pub kind: Option<RuleKind>,
    pub required: bool,
    pub message: Option<String>,
    /// Minimum string length / numeric value / array length (kind `min`).
    pub min: Option<f64>,
    /// Maximum string length / numeric value / array length (kind `max`).
    pub max: Option<f64>,
    /// Exact string/array length (kind `len`).
    pub len: Option<usize>,
    /// Regex pattern (kind `pattern`).
    pub pattern: Option<String>,
    /// Whitespace-only strings fail the required check.
    pub whitespace: bool,
    pub validator: Option<ValidatorFn>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("message", &self.message)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("len", &self.len)
            .field("pattern", &self.pattern)
            .field("whitespace", &self.whitespace)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Rule {
    pub fn required(message: impl Into<String>) -> Self {
        Rule {
            kind: Some(RuleKind::Required),
            required: true,
            message: Some(message.into()),
            ..Rule::default()
        }
    }

    pub fn email(message: impl Into<String>) -> Self {
        Rule {
            kind: Some(RuleKind::Email),
            message: Some(message.into()),
            ..Rule::default()
        }
    }

    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Rule {
            kind: Some(RuleKind::Pattern),
            pattern: Some(pattern.into()),
            message: Some(message.into()),
            ..Rule::default()
        }
    }

    pub fn min(min: f64, message: impl Into<String>) -> Self {
        Rule {
            kind: Some(RuleKind::Min),
            min: Some(min),
            message: Some(message.into()),
            ..Rule::default()
        }
    }

    pub fn max(max: f64, message: impl Into<String>) -> Self {
        Rule {
            kind: Some(RuleKind::Max),
            max: Some(max),
            message: Some(message.into()),
            ..Rule::default()
        }
    }

    pub fn custom<F>(validator: F) -> Self
    where
        F: Fn(&serde_json::Value, &ValueMap) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        Rule {
            kind: Some(RuleKind::Custom),
            validator: Some(Arc::new(validator)),
            ..Rule::default()
        }
    }
}
