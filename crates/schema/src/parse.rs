//! Hand-rolled parser for the data-only JSON representation of a schema.
//!
//! Function-valued members (generators, prop functions, custom predicates,
//! effect functions, option loaders, validators) cannot be expressed in
//! JSON; schemas that need them are built through the crate's constructor
//! API. Everything declarative round-trips: field metadata, static options,
//! value-enum maps, validation rules, legacy conditions, and the linkage
//! subset of dependencies, `when` trees, literal-valued effects, option
//! source fields, and value-compute expressions.
//!
//! Legacy key aliases from earlier schema revisions are accepted:
//! `dataIndex` for `name`, `valueType` for `componentType`.

use serde_json::Value;

use crate::condition::{CompositeCondition, ConditionExpr, FieldCondition};
use crate::error::SchemaError;
use crate::field::{FieldDescriptor, Schema, SchemaNode};
use crate::linkage::{EffectKind, LinkageConfig, LinkageEffect, OptionsSpec, RulesSpec, ValueCompute};
use crate::rule::{Rule, RuleKind};
use crate::value::{options_from_value_enum, OptionItem};

impl Schema {
    /// Parse a schema from a JSON array of field nodes.
    pub fn from_json(doc: &Value) -> Result<Schema, SchemaError> {
        let nodes = doc.as_array().ok_or(SchemaError::NotAnArray)?;
        let mut parsed = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            parsed.push(parse_node(node, index)?);
        }
        Ok(Schema::new(parsed))
    }
}

fn parse_node(node: &Value, index: usize) -> Result<SchemaNode, SchemaError> {
    let obj = node.as_object().ok_or_else(|| SchemaError::InvalidNode {
        index,
        message: "node must be a JSON object".to_string(),
    })?;

    let component_type = obj
        .get("componentType")
        .or_else(|| obj.get("valueType"))
        .and_then(|t| t.as_str())
        .unwrap_or("text")
        .to_string();

    if component_type == "dependency" {
        // The generator is code; dependency nodes only exist through the API.
        return Err(SchemaError::InvalidNode {
            index,
            message: "dependency nodes carry a generator function and cannot be expressed \
                      in JSON; register them through the builder API"
                .to_string(),
        });
    }

    let name = obj
        .get("name")
        .or_else(|| obj.get("dataIndex"))
        .and_then(|n| n.as_str())
        .ok_or_else(|| SchemaError::InvalidNode {
            index,
            message: "missing string field 'name'".to_string(),
        })?
        .to_string();

    let mut field = FieldDescriptor::new(name.clone(), component_type);
    field.title = get_string(obj, "title");
    field.tooltip = get_string(obj, "tooltip");
    field.placeholder = get_string(obj, "placeholder");
    field.required = get_bool(obj, "required");
    field.disabled = get_bool(obj, "disabled");
    field.initial_value = obj.get("initialValue").cloned();

    if let Some(options) = obj.get("options") {
        field.options = parse_options(options, &name, index)?;
    } else if let Some(value_enum) = obj.get("valueEnum").and_then(|v| v.as_object()) {
        field.options = options_from_value_enum(value_enum);
    }

    if let Some(props) = obj.get("componentProps").and_then(|p| p.as_object()) {
        field.component_props = props.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }

    if let Some(deps) = obj.get("dependencies") {
        field.dependencies = parse_string_list(deps);
    }

    if let Some(condition) = obj.get("condition") {
        field.condition = Some(parse_field_condition(condition, &name)?);
    }

    if let Some(rules) = obj.get("rules").and_then(|r| r.as_array()) {
        for rule in rules {
            field.rules.push(parse_rule(rule, &name)?);
        }
    }

    if let Some(linkage) = obj.get("linkage") {
        field.linkage = Some(parse_linkage(linkage, &name, index)?);
    }

    Ok(SchemaNode::Field(field))
}

// ──────────────────────────────────────────────
// Conditions
// ──────────────────────────────────────────────

fn parse_field_condition(value: &Value, field: &str) -> Result<FieldCondition, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::InvalidCondition {
            field: field.to_string(),
            message: "condition must be a JSON object".to_string(),
        })?;
    let cond_field =
        get_string(obj, "field").ok_or_else(|| SchemaError::InvalidCondition {
            field: field.to_string(),
            message: "condition missing string field 'field'".to_string(),
        })?;
    let operator = get_string(obj, "operator").ok_or_else(|| SchemaError::InvalidCondition {
        field: field.to_string(),
        message: "condition missing string field 'operator'".to_string(),
    })?;
    Ok(FieldCondition {
        field: cond_field,
        operator,
        value: obj.get("value").cloned().unwrap_or(Value::Null),
    })
}

fn parse_condition_expr(value: &Value, field: &str) -> Result<ConditionExpr, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::InvalidCondition {
            field: field.to_string(),
            message: "condition must be a JSON object".to_string(),
        })?;

    // A leaf carries a `field` key; a composite carries `conditions`.
    if obj.contains_key("field") {
        return Ok(ConditionExpr::Leaf(parse_field_condition(value, field)?));
    }

    let mut conditions = Vec::new();
    if let Some(list) = obj.get("conditions").and_then(|c| c.as_array()) {
        for condition in list {
            conditions.push(parse_field_condition(condition, field)?);
        }
    }
    Ok(ConditionExpr::Composite(CompositeCondition {
        operator: get_string(obj, "operator"),
        conditions,
        custom: None,
    }))
}

// ──────────────────────────────────────────────
// Linkage
// ──────────────────────────────────────────────

fn parse_linkage(value: &Value, field: &str, index: usize) -> Result<LinkageConfig, SchemaError> {
    let obj = value.as_object().ok_or_else(|| SchemaError::InvalidNode {
        index,
        message: format!("linkage for field '{}' must be a JSON object", field),
    })?;

    let mut linkage = LinkageConfig::new();

    if let Some(deps) = obj.get("dependencies") {
        linkage.dependencies = parse_string_list(deps);
    }

    if let Some(when) = obj.get("when") {
        linkage.when = Some(parse_condition_expr(when, field)?);
    }

    if let Some(options) = obj.get("options").and_then(|o| o.as_object()) {
        let mut spec = OptionsSpec::default();
        spec.source_field = get_string(options, "sourceField");
        linkage.options = Some(spec);
    }

    if let Some(rules) = obj.get("rules").and_then(|r| r.as_object()) {
        let mut spec = RulesSpec::default();
        if let Some(when) = rules.get("when") {
            spec.when = Some(parse_condition_expr(when, field)?);
        }
        linkage.rules = Some(spec);
    }

    if let Some(value_compute) = obj.get("valueCompute").and_then(|v| v.as_object()) {
        linkage.value_compute = Some(ValueCompute {
            expression: get_string(value_compute, "expression"),
            function: None,
        });
    }

    if let Some(effects) = obj.get("effects").and_then(|e| e.as_array()) {
        for effect in effects {
            linkage.effects.push(parse_effect(effect, field)?);
        }
    }

    Ok(linkage)
}

fn parse_effect(value: &Value, field: &str) -> Result<LinkageEffect, SchemaError> {
    let obj = value.as_object().ok_or_else(|| SchemaError::InvalidEffect {
        field: field.to_string(),
        message: "effect must be a JSON object".to_string(),
    })?;

    let target = match obj.get("target") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(list @ Value::Array(_)) => parse_string_list(list),
        _ => {
            return Err(SchemaError::InvalidEffect {
                field: field.to_string(),
                message: "effect missing 'target' (string or array of strings)".to_string(),
            })
        }
    };

    let kind_str = get_string(obj, "type").ok_or_else(|| SchemaError::InvalidEffect {
        field: field.to_string(),
        message: "effect missing string field 'type'".to_string(),
    })?;
    let kind = EffectKind::parse(&kind_str).ok_or_else(|| SchemaError::InvalidEffect {
        field: field.to_string(),
        message: format!("unknown effect type '{}'", kind_str),
    })?;

    let when = match obj.get("when") {
        Some(when) => Some(parse_condition_expr(when, field)?),
        None => None,
    };

    Ok(LinkageEffect {
        target,
        kind,
        when,
        value: obj.get("value").cloned(),
        effect: None,
        delay_ms: obj.get("delay").and_then(|d| d.as_u64()).unwrap_or(0),
    })
}

// ──────────────────────────────────────────────
// Rules and options
// ──────────────────────────────────────────────

fn parse_rule(value: &Value, field: &str) -> Result<Rule, SchemaError> {
    let obj = value.as_object().ok_or_else(|| SchemaError::InvalidRule {
        field: field.to_string(),
        message: "rule must be a JSON object".to_string(),
    })?;

    let kind = match get_string(obj, "type") {
        Some(kind_str) => Some(RuleKind::parse(&kind_str).ok_or_else(|| {
            SchemaError::InvalidRule {
                field: field.to_string(),
                message: format!("unknown rule type '{}'", kind_str),
            }
        })?),
        None => None,
    };

    Ok(Rule {
        kind,
        required: get_bool(obj, "required"),
        message: get_string(obj, "message"),
        min: obj.get("min").and_then(|m| m.as_f64()),
        max: obj.get("max").and_then(|m| m.as_f64()),
        len: obj.get("len").and_then(|l| l.as_u64()).map(|l| l as usize),
        pattern: get_string(obj, "pattern"),
        whitespace: get_bool(obj, "whitespace"),
        validator: None,
    })
}

fn parse_options(value: &Value, field: &str, index: usize) -> Result<Vec<OptionItem>, SchemaError> {
    let list = value.as_array().ok_or_else(|| SchemaError::InvalidNode {
        index,
        message: format!("options for field '{}' must be a JSON array", field),
    })?;
    let mut options = Vec::with_capacity(list.len());
    for entry in list {
        match entry {
            Value::String(s) => options.push(OptionItem::new(s.clone(), s.clone())),
            Value::Object(obj) => {
                let label = get_string(obj, "label").unwrap_or_default();
                options.push(OptionItem {
                    label,
                    value: obj.get("value").cloned().unwrap_or(Value::Null),
                    disabled: get_bool(obj, "disabled"),
                });
            }
            _ => {
                return Err(SchemaError::InvalidNode {
                    index,
                    message: format!(
                        "option entries for field '{}' must be strings or objects",
                        field
                    ),
                })
            }
        }
    }
    Ok(options)
}

// ──────────────────────────────────────────────
// JSON helpers
// ──────────────────────────────────────────────

fn get_string(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn get_bool(obj: &serde_json::Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn parse_string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
