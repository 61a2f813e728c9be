//! Field descriptors and the schema normalizer.
//!
//! A schema is a flat list of nodes. Regular nodes describe one rendered
//! field; dependency nodes are pseudo-fields that generate further nodes
//! from the values of the fields they watch. `Schema::new` splits the two
//! partitions while preserving declaration order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::condition::FieldCondition;
use crate::error::CallbackError;
use crate::handle::FormHandle;
use crate::linkage::LinkageConfig;
use crate::rule::Rule;
use crate::value::{FieldKey, OptionItem, ValueMap};

/// Generator of a dependency node: receives the watched value subset and the
/// form handle, returns the nodes to materialize. Must be a pure function of
/// its inputs -- the resolver re-invokes it on every relevant value change.
pub type GenerateFn =
    Arc<dyn Fn(&ValueMap, &dyn FormHandle) -> Result<Vec<SchemaNode>, CallbackError> + Send + Sync>;

/// Declarative definition of one rendered form field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: FieldKey,
    /// Component-type tag resolved through the renderer registry.
    pub component_type: String,
    pub title: Option<String>,
    pub tooltip: Option<String>,
    pub required: bool,
    pub disabled: bool,
    pub placeholder: Option<String>,
    pub initial_value: Option<serde_json::Value>,
    /// Static option list for select-style components.
    pub options: Vec<OptionItem>,
    /// Opaque props forwarded to the renderer.
    pub component_props: BTreeMap<String, serde_json::Value>,
    /// Legacy dependency declaration (superseded by `linkage.dependencies`).
    pub dependencies: Vec<FieldKey>,
    /// Legacy visibility shorthand (superseded by `linkage.when`).
    pub condition: Option<FieldCondition>,
    pub rules: Vec<Rule>,
    pub linkage: Option<LinkageConfig>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<FieldKey>, component_type: impl Into<String>) -> Self {
        FieldDescriptor {
            name: name.into(),
            component_type: component_type.into(),
            title: None,
            tooltip: None,
            required: false,
            disabled: false,
            placeholder: None,
            initial_value: None,
            options: Vec::new(),
            component_props: BTreeMap::new(),
            dependencies: Vec::new(),
            condition: None,
            rules: Vec::new(),
            linkage: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn initial_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    pub fn options(mut self, options: Vec<OptionItem>) -> Self {
        self.options = options;
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn condition(mut self, condition: FieldCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn linkage(mut self, linkage: LinkageConfig) -> Self {
        self.linkage = Some(linkage);
        self
    }
}

/// A pseudo-field that generates further nodes from watched values. Never
/// rendered itself.
#[derive(Clone)]
pub struct DependencyField {
    pub watched: Vec<FieldKey>,
    pub generate: GenerateFn,
}

impl DependencyField {
    pub fn new<F>(watched: Vec<FieldKey>, generate: F) -> Self
    where
        F: Fn(&ValueMap, &dyn FormHandle) -> Result<Vec<SchemaNode>, CallbackError>
            + Send
            + Sync
            + 'static,
    {
        DependencyField {
            watched,
            generate: Arc::new(generate),
        }
    }
}

impl fmt::Debug for DependencyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyField")
            .field("watched", &self.watched)
            .field("generate", &"<fn>")
            .finish()
    }
}

/// One entry of a flat schema list.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Field(FieldDescriptor),
    Dependency(DependencyField),
}

impl From<FieldDescriptor> for SchemaNode {
    fn from(field: FieldDescriptor) -> Self {
        SchemaNode::Field(field)
    }
}

impl From<DependencyField> for SchemaNode {
    fn from(dep: DependencyField) -> Self {
        SchemaNode::Dependency(dep)
    }
}

// ──────────────────────────────────────────────
// Schema
// ──────────────────────────────────────────────

/// A normalized schema: static fields and dependency pseudo-fields, each in
/// declaration order. Treated as read-only once handed to a form runtime.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    dependency_fields: Vec<DependencyField>,
}

impl Schema {
    /// Split a flat node list into its static and dependency partitions.
    pub fn new(nodes: Vec<SchemaNode>) -> Self {
        let mut fields = Vec::new();
        let mut dependency_fields = Vec::new();
        for node in nodes {
            match node {
                SchemaNode::Field(field) => fields.push(field),
                SchemaNode::Dependency(dep) => dependency_fields.push(dep),
            }
        }
        Schema {
            fields,
            dependency_fields,
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn dependency_fields(&self) -> &[DependencyField] {
        &self.dependency_fields
    }

    /// Initial value per static field: the declared `initial_value`, else a
    /// type-appropriate default. Fields whose type has no natural default
    /// (numbers, dates, single selects, ...) are simply absent.
    pub fn default_values(&self) -> ValueMap {
        let mut defaults = ValueMap::new();
        for field in &self.fields {
            if let Some(value) = &field.initial_value {
                defaults.insert(field.name.clone(), value.clone());
                continue;
            }
            let default = match field.component_type.as_str() {
                "text" | "password" | "email" | "tel" | "url" | "textarea" => {
                    Some(serde_json::Value::String(String::new()))
                }
                "switch" => Some(serde_json::Value::Bool(false)),
                "checkbox" => {
                    if field.options.is_empty() {
                        Some(serde_json::Value::Bool(false))
                    } else {
                        Some(serde_json::Value::Array(Vec::new()))
                    }
                }
                "select" => {
                    let multiple = field
                        .component_props
                        .get("multiple")
                        .and_then(|m| m.as_bool())
                        .unwrap_or(false);
                    multiple.then(|| serde_json::Value::Array(Vec::new()))
                }
                "cascader" | "image" => Some(serde_json::Value::Array(Vec::new())),
                "rate" => Some(serde_json::json!(0)),
                "slider" => Some(
                    field
                        .component_props
                        .get("min")
                        .cloned()
                        .unwrap_or(serde_json::json!(0)),
                ),
                _ => None,
            };
            if let Some(value) = default {
                defaults.insert(field.name.clone(), value);
            }
        }
        defaults
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
