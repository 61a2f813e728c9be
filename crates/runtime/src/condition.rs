//! Condition evaluation.
//!
//! `evaluate` is a pure function of the expression and the value map: no
//! side effects, deterministic for identical inputs, safe to call from
//! every recomputation path in a render pass.
//!
//! Failure defaults are deliberately asymmetric: an unknown leaf operator
//! is treated as satisfied (permissive), while an erroring custom predicate
//! is treated as false (fail-closed).

use formwork_schema::{CompositeCondition, ConditionExpr, FieldCondition, ValueMap};
use serde_json::Value;
use tracing::warn;

use crate::coerce::{json_eq, to_display_string, to_number};

/// Evaluate a condition expression against the current values.
pub fn evaluate(expr: &ConditionExpr, values: &ValueMap) -> bool {
    match expr {
        ConditionExpr::Leaf(condition) => evaluate_field_condition(condition, values),
        ConditionExpr::Composite(composite) => evaluate_composite(composite, values),
    }
}

fn evaluate_composite(composite: &CompositeCondition, values: &ValueMap) -> bool {
    // A custom predicate replaces the condition list entirely.
    if let Some(custom) = &composite.custom {
        return match custom(values) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "custom condition predicate failed; treating as false");
                false
            }
        };
    }

    if composite.conditions.is_empty() {
        return true;
    }

    let results = composite
        .conditions
        .iter()
        .map(|condition| evaluate_field_condition(condition, values));

    match composite.operator.as_deref() {
        Some("or") => results.into_iter().any(|r| r),
        Some("not") => !results.into_iter().any(|r| r),
        // "and" and anything unrecognized
        _ => results.into_iter().all(|r| r),
    }
}

/// Evaluate one field comparison. A missing field reads as `null`.
pub fn evaluate_field_condition(condition: &FieldCondition, values: &ValueMap) -> bool {
    let null = Value::Null;
    let field_value = values.get(&condition.field).unwrap_or(&null);
    let expected = &condition.value;

    match condition.operator.as_str() {
        "=" => json_eq(field_value, expected),
        "!=" => !json_eq(field_value, expected),
        "in" => expected
            .as_array()
            .is_some_and(|arr| arr.iter().any(|v| json_eq(v, field_value))),
        "notIn" => expected
            .as_array()
            .is_some_and(|arr| !arr.iter().any(|v| json_eq(v, field_value))),
        "gt" => to_number(field_value) > to_number(expected),
        "lt" => to_number(field_value) < to_number(expected),
        "gte" => to_number(field_value) >= to_number(expected),
        "lte" => to_number(field_value) <= to_number(expected),
        "includes" => to_display_string(field_value).contains(&to_display_string(expected)),
        "startsWith" => to_display_string(field_value).starts_with(&to_display_string(expected)),
        "endsWith" => to_display_string(field_value).ends_with(&to_display_string(expected)),
        "regex" => {
            let Some(pattern) = expected.as_str() else {
                warn!(
                    field = %condition.field,
                    "regex condition requires a string pattern; treating as false"
                );
                return false;
            };
            match regex::Regex::new(pattern) {
                Ok(re) => re.is_match(&to_display_string(field_value)),
                Err(e) => {
                    warn!(field = %condition.field, error = %e, "invalid regex pattern");
                    false
                }
            }
        }
        // Unknown operator: condition satisfied.
        _ => true,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
