//! Value map and option item types shared across the form runtime.
//!
//! Field values are plain `serde_json::Value`s -- the runtime does not impose
//! a typed value model on the host. The `ValueMap` is the single source of
//! truth for form state; it is mutated only through the form handle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of a form field. Field names are unique within one schema.
pub type FieldKey = String;

/// Current form state: field name -> value. Absent key means the field has
/// no value (distinct from an explicit `null`).
pub type ValueMap = BTreeMap<FieldKey, serde_json::Value>;

/// One selectable option for select/radio/checkbox-style fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub label: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl OptionItem {
    pub fn new(label: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        OptionItem {
            label: label.into(),
            value: value.into(),
            disabled: false,
        }
    }
}

/// Normalize a value-enum map (`value -> label` or `value -> {text, disabled}`)
/// into an option list. Entries that are neither strings nor objects with a
/// `text` field are skipped.
pub fn options_from_value_enum(value_enum: &serde_json::Map<String, serde_json::Value>) -> Vec<OptionItem> {
    let mut options = Vec::new();
    for (value, config) in value_enum {
        match config {
            serde_json::Value::String(text) => {
                options.push(OptionItem::new(text.clone(), value.clone()));
            }
            serde_json::Value::Object(obj) => {
                let Some(text) = obj.get("text").and_then(|t| t.as_str()) else {
                    continue;
                };
                options.push(OptionItem {
                    label: text.to_string(),
                    value: serde_json::Value::String(value.clone()),
                    disabled: obj.get("disabled").and_then(|d| d.as_bool()).unwrap_or(false),
                });
            }
            _ => {}
        }
    }
    options
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
