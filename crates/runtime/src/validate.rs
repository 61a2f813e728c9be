//! Rule validation.
//!
//! Consumes the static rules on a field descriptor plus the dynamic rules
//! produced by its linkage config. Validation reports the first failing
//! rule's message per field; hidden fields and dependency pseudo-fields are
//! never validated.

use formwork_schema::{FieldDescriptor, Rule, RuleKind, ValidationErrors, ValueMap};
use serde_json::Value;
use tracing::warn;

use crate::coerce::{to_display_string, to_number};
use crate::engine::LinkageEngine;
use crate::resolver::ActiveField;

/// Assemble the effective rule list for a field: static rules, then dynamic
/// rules, with an auto-prepended required rule when the descriptor is marked
/// required but no rule says so.
pub fn field_rules(descriptor: &FieldDescriptor, dynamic: Vec<Rule>) -> Vec<Rule> {
    let mut rules = descriptor.rules.clone();
    rules.extend(dynamic);

    let has_required = rules
        .iter()
        .any(|rule| rule.required || rule.kind == Some(RuleKind::Required));
    if descriptor.required && !has_required {
        let label = descriptor.title.as_deref().unwrap_or(&descriptor.name);
        rules.insert(0, Rule::required(format!("{} cannot be empty", label)));
    }

    rules
}

/// Validate one value against a rule list. Returns the first failure
/// message, or `None` when every rule passes.
pub fn validate_value(
    value: Option<&Value>,
    rules: &[Rule],
    values: &ValueMap,
) -> Option<String> {
    for rule in rules {
        if let Some(error) = check_rule(value, rule, values) {
            return Some(error);
        }
    }
    None
}

fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

fn message(rule: &Rule, fallback: &str) -> String {
    rule.message.clone().unwrap_or_else(|| fallback.to_string())
}

fn check_rule(value: Option<&Value>, rule: &Rule, values: &ValueMap) -> Option<String> {
    let is_required = rule.required || rule.kind == Some(RuleKind::Required);

    if is_required {
        if is_empty_value(value) {
            return Some(message(rule, "this field is required"));
        }
        if rule.whitespace {
            if let Some(Value::String(s)) = value {
                if s.trim().is_empty() {
                    return Some(message(rule, "this field is required"));
                }
            }
        }
    }

    // Empty optional values skip the remaining checks.
    if is_empty_value(value) && !is_required {
        return None;
    }
    let value = value?;

    match rule.kind {
        Some(RuleKind::Email) => {
            let text = to_display_string(value);
            let re = regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok()?;
            if !re.is_match(&text) {
                return Some(message(rule, "invalid email address"));
            }
        }
        Some(RuleKind::Phone) => {
            let text = to_display_string(value);
            let re = regex::Regex::new(r"^1[3-9]\d{9}$").ok()?;
            if !re.is_match(&text) {
                return Some(message(rule, "invalid phone number"));
            }
        }
        Some(RuleKind::Url) => {
            let text = to_display_string(value);
            let re = regex::Regex::new(r"^https?://.+").ok()?;
            if !re.is_match(&text) {
                return Some(message(rule, "invalid URL"));
            }
        }
        Some(RuleKind::Number) => {
            if to_number(value).is_nan() {
                return Some(message(rule, "must be a number"));
            }
        }
        Some(RuleKind::Min) | Some(RuleKind::Max) | None => {
            // min/max also apply without an explicit kind.
            if let Some(min) = rule.min {
                if let Some(error) = check_bound(value, min, true, rule) {
                    return Some(error);
                }
            }
            if let Some(max) = rule.max {
                if let Some(error) = check_bound(value, max, false, rule) {
                    return Some(error);
                }
            }
        }
        Some(RuleKind::Len) => {
            if let Some(expected) = rule.len {
                let actual = match value {
                    Value::String(s) => Some(s.chars().count()),
                    Value::Array(items) => Some(items.len()),
                    _ => None,
                };
                if actual.is_some_and(|actual| actual != expected) {
                    return Some(message(rule, &format!("must have length {}", expected)));
                }
            }
        }
        Some(RuleKind::Pattern) => {
            if let Some(pattern) = &rule.pattern {
                match regex::Regex::new(pattern) {
                    Ok(re) => {
                        if !re.is_match(&to_display_string(value)) {
                            return Some(message(rule, "invalid format"));
                        }
                    }
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "invalid validation pattern; skipping rule");
                    }
                }
            }
        }
        Some(RuleKind::Custom) => {
            if let Some(validator) = &rule.validator {
                if let Err(e) = validator(value, values) {
                    return Some(rule.message.clone().unwrap_or(e.0));
                }
            }
        }
        Some(RuleKind::Required) => {}
    }

    None
}

fn check_bound(value: &Value, bound: f64, is_min: bool, rule: &Rule) -> Option<String> {
    let violated = match value {
        Value::String(s) => {
            let len = s.chars().count() as f64;
            if is_min {
                len < bound
            } else {
                len > bound
            }
        }
        Value::Number(_) => {
            let n = to_number(value);
            if is_min {
                n < bound
            } else {
                n > bound
            }
        }
        Value::Array(items) => {
            let len = items.len() as f64;
            if is_min {
                len < bound
            } else {
                len > bound
            }
        }
        _ => false,
    };

    if violated {
        let fallback = if is_min {
            format!("must be at least {}", crate::coerce::format_number(bound))
        } else {
            format!("must be at most {}", crate::coerce::format_number(bound))
        };
        Some(message(rule, &fallback))
    } else {
        None
    }
}

/// Validate the visible fields of the active field list. Dependency
/// pseudo-fields never reach this point (they are not part of the active
/// list); hidden fields are skipped.
pub fn validate_form(
    active: &[ActiveField],
    engine: &LinkageEngine,
    values: &ValueMap,
    only: Option<&[String]>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for field in active {
        let descriptor = &field.descriptor;
        if let Some(only) = only {
            if !only.contains(&descriptor.name) {
                continue;
            }
        }
        if !engine.should_show_field(&descriptor.name, values) {
            continue;
        }

        let rules = field_rules(descriptor, engine.compute_rules(&descriptor.name, values));
        if let Some(error) = validate_value(values.get(&descriptor.name), &rules, values) {
            errors.insert(descriptor.name.clone(), error);
        }
    }

    errors
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
