//! Linkage configuration: how a field's visibility, props, options, rules,
//! and value react to other fields, and the side effects it fires on change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::condition::ConditionExpr;
use crate::error::CallbackError;
use crate::rule::Rule;
use crate::value::{FieldKey, OptionItem, ValueMap};

/// A callback computing `T` from the current value map.
pub type ValuesFn<T> = Arc<dyn Fn(&ValueMap) -> Result<T, CallbackError> + Send + Sync>;

/// Computes an arbitrary prop patch, merged over the built-in prop slots.
pub type PropsFn = ValuesFn<BTreeMap<String, serde_json::Value>>;

/// Turns a source field's raw value into an option list.
pub type OptionsTransformFn = Arc<
    dyn Fn(&serde_json::Value, &ValueMap) -> Result<Vec<OptionItem>, CallbackError> + Send + Sync,
>;

/// Filters an option list against the current values.
pub type OptionsFilterFn =
    Arc<dyn Fn(Vec<OptionItem>, &ValueMap) -> Result<Vec<OptionItem>, CallbackError> + Send + Sync>;

/// Computes a field value from `(values, current_value)`.
pub type ValueComputeFn = Arc<
    dyn Fn(&ValueMap, Option<&serde_json::Value>) -> Result<serde_json::Value, CallbackError>
        + Send
        + Sync,
>;

/// Computes the value a `setValue` effect writes into `(values, target)`.
pub type EffectFn =
    Arc<dyn Fn(&ValueMap, &str) -> Result<serde_json::Value, CallbackError> + Send + Sync>;

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Asynchronous option source (network, database, ...). Mirrors the shape of
/// an external data source returning `{label, value}` entries.
#[async_trait]
pub trait OptionsLoader: Send + Sync {
    async fn load(&self, values: &ValueMap) -> Result<Vec<OptionItem>, CallbackError>;
}

/// An options loader that returns a fixed list. Useful for tests and for
/// option sets known ahead of time.
pub struct StaticOptions {
    items: Vec<OptionItem>,
}

impl StaticOptions {
    pub fn new(items: Vec<OptionItem>) -> Self {
        StaticOptions { items }
    }
}

#[async_trait]
impl OptionsLoader for StaticOptions {
    async fn load(&self, _values: &ValueMap) -> Result<Vec<OptionItem>, CallbackError> {
        Ok(self.items.clone())
    }
}

/// How a field's option list is derived. Precedence at compute time:
/// `load` (awaited) > `compute` > `source_field` (+ `transform`, + `filter`).
#[derive(Clone, Default)]
pub struct OptionsSpec {
    /// Field whose (array) value seeds the option list.
    pub source_field: Option<FieldKey>,
    pub transform: Option<OptionsTransformFn>,
    pub filter: Option<OptionsFilterFn>,
    pub load: Option<Arc<dyn OptionsLoader>>,
    pub compute: Option<ValuesFn<Vec<OptionItem>>>,
}

impl fmt::Debug for OptionsSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsSpec")
            .field("source_field", &self.source_field)
            .field("transform", &self.transform.as_ref().map(|_| "<fn>"))
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("load", &self.load.as_ref().map(|_| "<loader>"))
            .field("compute", &self.compute.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// ──────────────────────────────────────────────
// Props / rules / value
// ──────────────────────────────────────────────

/// Per-slot dynamic prop functions. Each present function is evaluated with
/// the full value map; `custom`'s patch is merged last and may override the
/// named slots.
#[derive(Clone, Default)]
pub struct LinkageProps {
    pub disabled: Option<ValuesFn<bool>>,
    pub required: Option<ValuesFn<bool>>,
    pub placeholder: Option<ValuesFn<String>>,
    pub title: Option<ValuesFn<String>>,
    pub help: Option<ValuesFn<String>>,
    pub custom: Option<PropsFn>,
}

impl LinkageProps {
    pub fn is_empty(&self) -> bool {
        self.disabled.is_none()
            && self.required.is_none()
            && self.placeholder.is_none()
            && self.title.is_none()
            && self.help.is_none()
            && self.custom.is_none()
    }
}

impl fmt::Debug for LinkageProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkageProps {{ .. }}")
    }
}

/// Conditionally computed validation rules. When `when` evaluates false the
/// entire dynamic rule set is suppressed, not filtered per rule.
#[derive(Clone, Default)]
pub struct RulesSpec {
    pub when: Option<ConditionExpr>,
    pub compute: Option<ValuesFn<Vec<Rule>>>,
}

impl fmt::Debug for RulesSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulesSpec")
            .field("when", &self.when)
            .field("compute", &self.compute.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Value derivation: a function of `(values, current)`, or a restricted
/// arithmetic/logical expression over value-map identifiers. The function
/// wins when both are present; any error leaves the current value unchanged.
#[derive(Clone, Default)]
pub struct ValueCompute {
    pub expression: Option<String>,
    pub function: Option<ValueComputeFn>,
}

impl fmt::Debug for ValueCompute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCompute")
            .field("expression", &self.expression)
            .field("function", &self.function.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// ──────────────────────────────────────────────
// Effects
// ──────────────────────────────────────────────

/// What a linkage effect does to its target fields.
///
/// `Show`/`Hide`/`Enable`/`Disable`/`SetOptions`/`SetProps` are reserved for
/// prop-patch semantics and are no-ops in the base engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    SetValue,
    Clear,
    Validate,
    Show,
    Hide,
    Enable,
    Disable,
    SetOptions,
    SetProps,
}

impl EffectKind {
    pub fn parse(s: &str) -> Option<EffectKind> {
        match s {
            "setValue" => Some(EffectKind::SetValue),
            "clear" => Some(EffectKind::Clear),
            "validate" => Some(EffectKind::Validate),
            "show" => Some(EffectKind::Show),
            "hide" => Some(EffectKind::Hide),
            "enable" => Some(EffectKind::Enable),
            "disable" => Some(EffectKind::Disable),
            "setOptions" => Some(EffectKind::SetOptions),
            "setProps" => Some(EffectKind::SetProps),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::SetValue => "setValue",
            EffectKind::Clear => "clear",
            EffectKind::Validate => "validate",
            EffectKind::Show => "show",
            EffectKind::Hide => "hide",
            EffectKind::Enable => "enable",
            EffectKind::Disable => "disable",
            EffectKind::SetOptions => "setOptions",
            EffectKind::SetProps => "setProps",
        }
    }
}

/// A one-shot action applied to one or more target fields when the owning
/// field changes. Each effect is scheduled independently after `delay_ms`;
/// effects with differing delays may complete out of declaration order.
#[derive(Clone)]
pub struct LinkageEffect {
    pub target: Vec<FieldKey>,
    pub kind: EffectKind,
    /// Gate evaluated against the values captured when the change fired;
    /// false skips the effect.
    pub when: Option<ConditionExpr>,
    /// Literal value for `setValue` when no effect function is given.
    pub value: Option<serde_json::Value>,
    pub effect: Option<EffectFn>,
    pub delay_ms: u64,
}

impl LinkageEffect {
    pub fn new(kind: EffectKind, target: impl Into<FieldKey>) -> Self {
        LinkageEffect {
            target: vec![target.into()],
            kind,
            when: None,
            value: None,
            effect: None,
            delay_ms: 0,
        }
    }

    pub fn set_value(target: impl Into<FieldKey>, value: impl Into<serde_json::Value>) -> Self {
        let mut effect = LinkageEffect::new(EffectKind::SetValue, target);
        effect.value = Some(value.into());
        effect
    }

    pub fn clear(target: impl Into<FieldKey>) -> Self {
        LinkageEffect::new(EffectKind::Clear, target)
    }

    pub fn validate(target: impl Into<FieldKey>) -> Self {
        LinkageEffect::new(EffectKind::Validate, target)
    }

    pub fn when(mut self, condition: ConditionExpr) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

impl fmt::Debug for LinkageEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkageEffect")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("when", &self.when)
            .field("value", &self.value)
            .field("effect", &self.effect.as_ref().map(|_| "<fn>"))
            .field("delay_ms", &self.delay_ms)
            .finish()
    }
}

// ──────────────────────────────────────────────
// LinkageConfig
// ──────────────────────────────────────────────

/// The full linkage configuration attached to one field descriptor.
#[derive(Debug, Clone, Default)]
pub struct LinkageConfig {
    /// Additional fields whose change forces recomputation of this field.
    pub dependencies: Vec<FieldKey>,
    /// Visibility gate. Takes precedence over the descriptor's legacy
    /// `condition`.
    pub when: Option<ConditionExpr>,
    pub props: LinkageProps,
    pub options: Option<OptionsSpec>,
    pub rules: Option<RulesSpec>,
    pub value_compute: Option<ValueCompute>,
    pub effects: Vec<LinkageEffect>,
}

impl LinkageConfig {
    pub fn new() -> Self {
        LinkageConfig::default()
    }

    pub fn depends_on(mut self, fields: impl IntoIterator<Item = impl Into<FieldKey>>) -> Self {
        self.dependencies.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn when(mut self, condition: ConditionExpr) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn effect(mut self, effect: LinkageEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
