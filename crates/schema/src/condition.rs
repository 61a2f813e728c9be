//! Condition expression types.
//!
//! A condition is either a single field comparison or a composite over a
//! list of field comparisons, optionally replaced by a custom predicate.
//! Operators are open strings, not a closed enum: the evaluator treats an
//! unknown leaf operator as satisfied, so unknown operators must be
//! representable in the data model.

use std::fmt;
use std::sync::Arc;

use crate::error::CallbackError;
use crate::value::ValueMap;

/// Custom predicate over the full value map. A returned error is logged by
/// the evaluator and treated as `false`.
pub type CustomPredicate = Arc<dyn Fn(&ValueMap) -> Result<bool, CallbackError> + Send + Sync>;

/// A single field comparison: `values[field] <operator> value`.
///
/// Known operators: `=`, `!=`, `in`, `notIn`, `gt`, `lt`, `gte`, `lte`,
/// `includes`, `startsWith`, `endsWith`, `regex`. Anything else evaluates
/// as satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub operator: String,
    pub value: serde_json::Value,
}

impl FieldCondition {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        FieldCondition {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// A composite condition: `and`/`or`/`not` over a list of field comparisons,
/// or a custom predicate (which takes precedence over the list).
/// An unknown combinator falls back to `and`; an empty list is satisfied.
#[derive(Clone, Default)]
pub struct CompositeCondition {
    pub operator: Option<String>,
    pub conditions: Vec<FieldCondition>,
    pub custom: Option<CustomPredicate>,
}

impl fmt::Debug for CompositeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCondition")
            .field("operator", &self.operator)
            .field("conditions", &self.conditions)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// A condition expression tree: a leaf comparison or a composite.
#[derive(Debug, Clone)]
pub enum ConditionExpr {
    Leaf(FieldCondition),
    Composite(CompositeCondition),
}

impl ConditionExpr {
    /// A single comparison leaf.
    pub fn leaf(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        ConditionExpr::Leaf(FieldCondition::new(field, operator, value))
    }

    /// All of the given comparisons must hold.
    pub fn all(conditions: Vec<FieldCondition>) -> Self {
        ConditionExpr::Composite(CompositeCondition {
            operator: Some("and".to_string()),
            conditions,
            custom: None,
        })
    }

    /// At least one of the given comparisons must hold.
    pub fn any(conditions: Vec<FieldCondition>) -> Self {
        ConditionExpr::Composite(CompositeCondition {
            operator: Some("or".to_string()),
            conditions,
            custom: None,
        })
    }

    /// None of the given comparisons may hold.
    pub fn none(conditions: Vec<FieldCondition>) -> Self {
        ConditionExpr::Composite(CompositeCondition {
            operator: Some("not".to_string()),
            conditions,
            custom: None,
        })
    }

    /// A custom predicate over the value map.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&ValueMap) -> Result<bool, CallbackError> + Send + Sync + 'static,
    {
        ConditionExpr::Composite(CompositeCondition {
            operator: None,
            conditions: Vec::new(),
            custom: Some(Arc::new(predicate)),
        })
    }
}

impl From<FieldCondition> for ConditionExpr {
    fn from(condition: FieldCondition) -> Self {
        ConditionExpr::Leaf(condition)
    }
}
