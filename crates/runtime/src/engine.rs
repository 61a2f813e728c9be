//! The linkage engine: per-field computed state and effect execution.
//!
//! One engine instance serves one mounted form for one active field set; it
//! is rebuilt whenever dynamic fields appear or disappear. It holds the
//! dependency graph, an index of effects keyed by their owning field, and
//! the props computation cache.
//!
//! Schema-author callbacks never propagate errors out of the engine: every
//! call site logs the failure and degrades to "no contribution" (empty
//! list, unchanged value, skipped prop).

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use formwork_schema::{
    EffectKind, FieldDescriptor, FieldKey, FormHandle, LinkageEffect, OptionItem, Rule, ValueMap,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::condition::evaluate;
use crate::expr::evaluate_expression;
use crate::graph::{self, DependencyGraph};
use crate::resolver::ActiveField;

/// Computed prop patch for one field.
pub type ComputedProps = BTreeMap<String, Value>;

pub struct LinkageEngine {
    fields: BTreeMap<FieldKey, FieldDescriptor>,
    /// Effects keyed by the field whose linkage declares them; executed when
    /// that field changes.
    effects: BTreeMap<FieldKey, Vec<LinkageEffect>>,
    graph: DependencyGraph,
    /// Cache key is the field name plus the serialized FULL value map --
    /// deliberately over-broad (any value change misses), kept for
    /// compatibility with the engine's established behavior. Never pruned
    /// automatically; `clear_cache` drops it wholesale.
    cache: Mutex<BTreeMap<String, ComputedProps>>,
}

impl LinkageEngine {
    /// Build the engine for the given active field list.
    pub fn new(active: &[ActiveField]) -> Self {
        let graph = graph::build(active);
        let mut fields = BTreeMap::new();
        let mut effects: BTreeMap<FieldKey, Vec<LinkageEffect>> = BTreeMap::new();

        for field in active {
            let descriptor = &field.descriptor;
            if let Some(linkage) = &descriptor.linkage {
                if !linkage.effects.is_empty() {
                    effects
                        .entry(descriptor.name.clone())
                        .or_default()
                        .extend(linkage.effects.iter().cloned());
                }
            }
            fields.insert(descriptor.name.clone(), descriptor.clone());
        }

        LinkageEngine {
            fields,
            effects,
            graph,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Rebuild for a changed active field set, carrying the props cache over
    /// from the previous engine. The cache is invalidated only by an
    /// explicit [`clear_cache`](Self::clear_cache); its keys embed the full
    /// serialized value map, so stale entries cannot be read back for
    /// changed values.
    pub fn rebuilt(active: &[ActiveField], previous: Option<&LinkageEngine>) -> Self {
        let engine = LinkageEngine::new(active);
        if let Some(previous) = previous {
            *engine.cache.lock().unwrap() = previous.cache.lock().unwrap().clone();
        }
        engine
    }

    /// Fields whose change invalidates the given field's computed state.
    pub fn get_dependencies(&self, field: &str) -> Vec<FieldKey> {
        self.graph
            .get(field)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Visibility gate: `linkage.when`, else the legacy condition, else
    /// always visible. Recomputed fresh every pass; holds no state.
    pub fn should_show_field(&self, field: &str, values: &ValueMap) -> bool {
        let Some(descriptor) = self.fields.get(field) else {
            return true;
        };
        if let Some(linkage) = &descriptor.linkage {
            if let Some(when) = &linkage.when {
                return evaluate(when, values);
            }
        }
        if let Some(condition) = &descriptor.condition {
            return evaluate(&condition.clone().into(), values);
        }
        true
    }

    /// Evaluate the field's dynamic prop functions and merge their results.
    /// `custom`'s patch merges last and may override the named slots.
    pub fn compute_props(&self, field: &str, values: &ValueMap) -> ComputedProps {
        let cache_key = format!(
            "{}::props::{}",
            field,
            serde_json::to_string(values).unwrap_or_default()
        );
        if let Some(cached) = self.cache.lock().unwrap().get(&cache_key) {
            return cached.clone();
        }

        let mut computed = ComputedProps::new();
        if let Some(props) = self
            .fields
            .get(field)
            .and_then(|d| d.linkage.as_ref())
            .map(|l| &l.props)
        {
            if let Some(disabled) = &props.disabled {
                match disabled(values) {
                    Ok(v) => {
                        computed.insert("disabled".to_string(), Value::Bool(v));
                    }
                    Err(e) => warn!(field, error = %e, "disabled prop function failed"),
                }
            }
            if let Some(required) = &props.required {
                match required(values) {
                    Ok(v) => {
                        computed.insert("required".to_string(), Value::Bool(v));
                    }
                    Err(e) => warn!(field, error = %e, "required prop function failed"),
                }
            }
            if let Some(placeholder) = &props.placeholder {
                match placeholder(values) {
                    Ok(v) => {
                        computed.insert("placeholder".to_string(), Value::String(v));
                    }
                    Err(e) => warn!(field, error = %e, "placeholder prop function failed"),
                }
            }
            if let Some(title) = &props.title {
                match title(values) {
                    Ok(v) => {
                        computed.insert("title".to_string(), Value::String(v));
                    }
                    Err(e) => warn!(field, error = %e, "title prop function failed"),
                }
            }
            if let Some(help) = &props.help {
                match help(values) {
                    Ok(v) => {
                        computed.insert("help".to_string(), Value::String(v));
                    }
                    Err(e) => warn!(field, error = %e, "help prop function failed"),
                }
            }
            if let Some(custom) = &props.custom {
                match custom(values) {
                    Ok(patch) => computed.extend(patch),
                    Err(e) => warn!(field, error = %e, "custom prop function failed"),
                }
            }
        }

        self.cache
            .lock()
            .unwrap()
            .insert(cache_key, computed.clone());
        computed
    }

    /// Compute the field's option list. Precedence: async loader >
    /// synchronous compute > source-field derivation. Errors yield an empty
    /// list, never a propagated failure.
    pub async fn compute_options(&self, field: &str, values: &ValueMap) -> Vec<OptionItem> {
        let Some(spec) = self
            .fields
            .get(field)
            .and_then(|d| d.linkage.as_ref())
            .and_then(|l| l.options.as_ref())
        else {
            return Vec::new();
        };

        if let Some(loader) = &spec.load {
            return match loader.load(values).await {
                Ok(options) => options,
                Err(e) => {
                    warn!(field, error = %e, "async options loader failed");
                    Vec::new()
                }
            };
        }

        if let Some(compute) = &spec.compute {
            return match compute(values) {
                Ok(options) => options,
                Err(e) => {
                    warn!(field, error = %e, "options compute function failed");
                    Vec::new()
                }
            };
        }

        if let Some(source_field) = &spec.source_field {
            let null = Value::Null;
            let source_value = values.get(source_field).unwrap_or(&null);

            if let Some(transform) = &spec.transform {
                return match transform(source_value, values) {
                    Ok(options) => options,
                    Err(e) => {
                        warn!(field, error = %e, "options transform function failed");
                        Vec::new()
                    }
                };
            }

            if source_value.is_array() {
                let options = options_from_array(source_value);
                if let Some(filter) = &spec.filter {
                    return match filter(options, values) {
                        Ok(filtered) => filtered,
                        Err(e) => {
                            warn!(field, error = %e, "options filter function failed");
                            Vec::new()
                        }
                    };
                }
                return options;
            }
        }

        Vec::new()
    }

    /// Compute the field's dynamic validation rules. When the gate is false
    /// the dynamic rule set is suppressed entirely, not filtered per rule.
    pub fn compute_rules(&self, field: &str, values: &ValueMap) -> Vec<Rule> {
        let Some(spec) = self
            .fields
            .get(field)
            .and_then(|d| d.linkage.as_ref())
            .and_then(|l| l.rules.as_ref())
        else {
            return Vec::new();
        };

        if let Some(when) = &spec.when {
            if !evaluate(when, values) {
                return Vec::new();
            }
        }

        match &spec.compute {
            Some(compute) => match compute(values) {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(field, error = %e, "rules compute function failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }

    /// Derive the field's value. The compute function wins over the
    /// expression; any failure leaves the current value unchanged.
    pub fn compute_value(
        &self,
        field: &str,
        values: &ValueMap,
        current: Option<&Value>,
    ) -> Option<Value> {
        let Some(spec) = self
            .fields
            .get(field)
            .and_then(|d| d.linkage.as_ref())
            .and_then(|l| l.value_compute.as_ref())
        else {
            return current.cloned();
        };

        if let Some(function) = &spec.function {
            return match function(values, current) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(field, error = %e, "value compute function failed");
                    current.cloned()
                }
            };
        }

        if let Some(expression) = &spec.expression {
            return match evaluate_expression(expression, values) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(field, expression = %expression, error = %e, "value expression failed");
                    current.cloned()
                }
            };
        }

        current.cloned()
    }

    /// Execute the effects declared on `changed_field`.
    ///
    /// Each effect is scheduled independently after its delay; effects are
    /// fire-and-forget relative to each other and may apply in any order
    /// across differing delays (declaration order holds only for equal
    /// delays). The returned future resolves when the effect at the LAST
    /// array index has fired or been skipped -- not when every effect has
    /// completed. Pending timers are not cancelled if the form goes away.
    ///
    /// Conditions and effect functions see the values captured at call
    /// time, not the values at timer expiry.
    pub fn execute_effects(
        &self,
        changed_field: &str,
        values: &ValueMap,
        handle: Arc<dyn FormHandle>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let effects = self
            .effects
            .get(changed_field)
            .cloned()
            .unwrap_or_default();
        let values = values.clone();

        async move {
            if effects.is_empty() {
                return;
            }

            let last = effects.len() - 1;
            let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
            let mut done_tx = Some(done_tx);

            for (index, effect) in effects.into_iter().enumerate() {
                let values = values.clone();
                let handle = handle.clone();
                let done = if index == last { done_tx.take() } else { None };

                tokio::spawn(async move {
                    if effect.delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(effect.delay_ms)).await;
                    }

                    let satisfied = effect
                        .when
                        .as_ref()
                        .map(|when| evaluate(when, &values))
                        .unwrap_or(true);
                    if satisfied {
                        apply_effect(&effect, &values, handle.as_ref());
                    }

                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                });
            }

            let _ = done_rx.await;
        }
    }

    /// Drop the entire props cache. The engine never auto-invalidates;
    /// callers doing bulk value writes must call this afterwards.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}

fn apply_effect(effect: &LinkageEffect, values: &ValueMap, handle: &dyn FormHandle) {
    for target in &effect.target {
        match effect.kind {
            EffectKind::SetValue => {
                let value = match &effect.effect {
                    Some(function) => match function(values, target) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!(target = %target, error = %e, "effect function failed");
                            continue;
                        }
                    },
                    None => effect.value.clone().unwrap_or(Value::Null),
                };
                handle.set_field_value(target, value);
            }
            EffectKind::Clear => handle.clear_field_value(target),
            EffectKind::Validate => {
                if handle.validate_fields(Some(&[target.clone()])).is_err() {
                    debug!(target = %target, "validation effect reported errors");
                }
            }
            // Reserved for prop-patch semantics.
            EffectKind::Show
            | EffectKind::Hide
            | EffectKind::Enable
            | EffectKind::Disable
            | EffectKind::SetOptions
            | EffectKind::SetProps => {}
        }
    }
}

/// Lenient option conversion for source-field derivation: strings become
/// label=value entries, `{label, value}` objects map through, anything else
/// is skipped.
fn options_from_array(value: &Value) -> Vec<OptionItem> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    let mut options = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => options.push(OptionItem::new(s.clone(), s.clone())),
            Value::Object(obj) => {
                let label = obj
                    .get("label")
                    .and_then(|l| l.as_str())
                    .unwrap_or_default()
                    .to_string();
                options.push(OptionItem {
                    label,
                    value: obj.get("value").cloned().unwrap_or(Value::Null),
                    disabled: obj
                        .get("disabled")
                        .and_then(|d| d.as_bool())
                        .unwrap_or(false),
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

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_schema::{
        ConditionExpr, FieldCondition, LinkageConfig, LinkageProps, OptionsSpec, RulesSpec,
        StaticOptions, ValidationErrors, ValueCompute,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine_for(fields: Vec<FieldDescriptor>) -> LinkageEngine {
        let active: Vec<ActiveField> = fields
            .into_iter()
            .map(|descriptor| ActiveField {
                descriptor,
                generated: false,
                watched: Vec::new(),
            })
            .collect();
        LinkageEngine::new(&active)
    }

    fn values(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Form handle backed by a bare value map, for exercising effects.
    #[derive(Default)]
    struct MapHandle {
        values: Mutex<ValueMap>,
        validated: Mutex<Vec<String>>,
    }

    impl FormHandle for MapHandle {
        fn get_field_value(&self, name: &str) -> Option<Value> {
            self.values.lock().unwrap().get(name).cloned()
        }
        fn get_fields_value(&self) -> ValueMap {
            self.values.lock().unwrap().clone()
        }
        fn set_field_value(&self, name: &str, value: Value) {
            self.values.lock().unwrap().insert(name.to_string(), value);
        }
        fn clear_field_value(&self, name: &str) {
            self.values.lock().unwrap().remove(name);
        }
        fn set_fields_value(&self, values: ValueMap) {
            self.values.lock().unwrap().extend(values);
        }
        fn validate_fields(&self, names: Option<&[String]>) -> Result<(), ValidationErrors> {
            if let Some(names) = names {
                self.validated.lock().unwrap().extend(names.iter().cloned());
            }
            Ok(())
        }
        fn reset_fields(&self) {}
        fn submit(&self) {}
    }

    #[test]
    fn should_show_prefers_linkage_when_over_legacy_condition() {
        let field = FieldDescriptor::new("x", "text")
            .condition(FieldCondition::new("a", "=", 1))
            .linkage(LinkageConfig::new().when(ConditionExpr::leaf("a", "=", 2)));
        let engine = engine_for(vec![field]);
        assert!(!engine.should_show_field("x", &values(&[("a", json!(1))])));
        assert!(engine.should_show_field("x", &values(&[("a", json!(2))])));
    }

    #[test]
    fn should_show_falls_back_to_legacy_condition_then_visible() {
        let legacy =
            FieldDescriptor::new("y", "text").condition(FieldCondition::new("a", "=", 1));
        let plain = FieldDescriptor::new("z", "text");
        let engine = engine_for(vec![legacy, plain]);
        assert!(engine.should_show_field("y", &values(&[("a", json!(1))])));
        assert!(!engine.should_show_field("y", &values(&[("a", json!(2))])));
        assert!(engine.should_show_field("z", &ValueMap::new()));
        // Unknown fields default to visible.
        assert!(engine.should_show_field("ghost", &ValueMap::new()));
    }

    #[test]
    fn compute_props_merges_slots_and_custom_patch() {
        let mut linkage = LinkageConfig::new();
        linkage.props = LinkageProps {
            disabled: Some(Arc::new(|values| {
                Ok(values.get("locked") == Some(&json!(true)))
            })),
            placeholder: Some(Arc::new(|_| Ok("enter a value".to_string()))),
            custom: Some(Arc::new(|_| {
                Ok([("rows".to_string(), json!(4))].into_iter().collect())
            })),
            ..LinkageProps::default()
        };
        let engine = engine_for(vec![FieldDescriptor::new("notes", "textarea").linkage(linkage)]);

        let props = engine.compute_props("notes", &values(&[("locked", json!(true))]));
        assert_eq!(props["disabled"], json!(true));
        assert_eq!(props["placeholder"], json!("enter a value"));
        assert_eq!(props["rows"], json!(4));
    }

    #[test]
    fn compute_props_caches_on_full_value_map() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut linkage = LinkageConfig::new();
        linkage.props = LinkageProps {
            disabled: Some(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            })),
            ..LinkageProps::default()
        };
        let engine = engine_for(vec![FieldDescriptor::new("x", "text").linkage(linkage)]);

        let vals = values(&[("a", json!(1))]);
        engine.compute_props("x", &vals);
        engine.compute_props("x", &vals);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Changing ANY value misses the cache, even one the prop never reads.
        let other = values(&[("a", json!(1)), ("unrelated", json!(2))]);
        engine.compute_props("x", &other);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        engine.clear_cache();
        engine.compute_props("x", &vals);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failing_prop_function_contributes_nothing() {
        let mut linkage = LinkageConfig::new();
        linkage.props = LinkageProps {
            disabled: Some(Arc::new(|_| Err("boom".into()))),
            placeholder: Some(Arc::new(|_| Ok("still here".to_string()))),
            ..LinkageProps::default()
        };
        let engine = engine_for(vec![FieldDescriptor::new("x", "text").linkage(linkage)]);
        let props = engine.compute_props("x", &ValueMap::new());
        assert!(!props.contains_key("disabled"));
        assert_eq!(props["placeholder"], json!("still here"));
    }

    #[tokio::test]
    async fn compute_options_precedence_async_over_compute() {
        let mut linkage = LinkageConfig::new();
        linkage.options = Some(OptionsSpec {
            load: Some(Arc::new(StaticOptions::new(vec![OptionItem::new(
                "From loader",
                "l",
            )]))),
            compute: Some(Arc::new(|_| Ok(vec![OptionItem::new("From compute", "c")]))),
            ..OptionsSpec::default()
        });
        let engine = engine_for(vec![FieldDescriptor::new("x", "select").linkage(linkage)]);
        let options = engine.compute_options("x", &ValueMap::new()).await;
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].label, "From loader");
    }

    #[tokio::test]
    async fn compute_options_source_field_with_filter() {
        let mut linkage = LinkageConfig::new();
        linkage.options = Some(OptionsSpec {
            source_field: Some("cities".to_string()),
            filter: Some(Arc::new(|options, _| {
                Ok(options.into_iter().filter(|o| !o.disabled).collect())
            })),
            ..OptionsSpec::default()
        });
        let engine = engine_for(vec![FieldDescriptor::new("city", "select").linkage(linkage)]);

        let vals = values(&[(
            "cities",
            json!([
                { "label": "Beijing", "value": "beijing" },
                { "label": "Gone", "value": "gone", "disabled": true },
                "shanghai"
            ]),
        )]);
        let options = engine.compute_options("city", &vals).await;
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "Beijing");
        assert_eq!(options[1].value, json!("shanghai"));
    }

    #[tokio::test]
    async fn compute_options_errors_yield_empty_list() {
        let mut linkage = LinkageConfig::new();
        linkage.options = Some(OptionsSpec {
            compute: Some(Arc::new(|_| Err("no options for you".into()))),
            ..OptionsSpec::default()
        });
        let engine = engine_for(vec![FieldDescriptor::new("x", "select").linkage(linkage)]);
        assert!(engine.compute_options("x", &ValueMap::new()).await.is_empty());

        // No options spec at all behaves the same.
        let bare = engine_for(vec![FieldDescriptor::new("y", "select")]);
        assert!(bare.compute_options("y", &ValueMap::new()).await.is_empty());
    }

    #[test]
    fn compute_rules_suppressed_when_gate_is_false() {
        let mut linkage = LinkageConfig::new();
        linkage.rules = Some(RulesSpec {
            when: Some(ConditionExpr::leaf("strict", "=", true)),
            compute: Some(Arc::new(|_| Ok(vec![Rule::required("required in strict mode")]))),
        });
        let engine = engine_for(vec![FieldDescriptor::new("x", "text").linkage(linkage)]);

        assert!(engine
            .compute_rules("x", &values(&[("strict", json!(false))]))
            .is_empty());
        let rules = engine.compute_rules("x", &values(&[("strict", json!(true))]));
        assert_eq!(rules.len(), 1);
        assert!(rules[0].required);
    }

    #[test]
    fn compute_rules_error_yields_empty() {
        let mut linkage = LinkageConfig::new();
        linkage.rules = Some(RulesSpec {
            when: None,
            compute: Some(Arc::new(|_| Err("broken".into()))),
        });
        let engine = engine_for(vec![FieldDescriptor::new("x", "text").linkage(linkage)]);
        assert!(engine.compute_rules("x", &ValueMap::new()).is_empty());
    }

    #[test]
    fn compute_value_expression_and_fallback() {
        let mut linkage = LinkageConfig::new();
        linkage.value_compute = Some(ValueCompute {
            expression: Some("price * quantity".to_string()),
            function: None,
        });
        let engine = engine_for(vec![FieldDescriptor::new("total", "number").linkage(linkage)]);

        let vals = values(&[("price", json!(3)), ("quantity", json!(5))]);
        assert_eq!(
            engine.compute_value("total", &vals, Some(&json!(0))),
            Some(json!(15.0))
        );

        // Unknown identifier: current value survives untouched.
        assert_eq!(
            engine.compute_value("total", &ValueMap::new(), Some(&json!(42))),
            Some(json!(42))
        );
    }

    #[test]
    fn compute_value_function_wins_and_errors_keep_current() {
        let mut linkage = LinkageConfig::new();
        linkage.value_compute = Some(ValueCompute {
            expression: Some("1 + 1".to_string()),
            function: Some(Arc::new(|_, current| {
                Ok(json!(current.and_then(|v| v.as_i64()).unwrap_or(0) + 100))
            })),
        });
        let engine = engine_for(vec![FieldDescriptor::new("x", "number").linkage(linkage)]);
        assert_eq!(
            engine.compute_value("x", &ValueMap::new(), Some(&json!(1))),
            Some(json!(101))
        );

        let mut failing = LinkageConfig::new();
        failing.value_compute = Some(ValueCompute {
            expression: None,
            function: Some(Arc::new(|_, _| Err("nope".into()))),
        });
        let engine = engine_for(vec![FieldDescriptor::new("y", "number").linkage(failing)]);
        assert_eq!(
            engine.compute_value("y", &ValueMap::new(), Some(&json!(7))),
            Some(json!(7))
        );
    }

    #[tokio::test]
    async fn set_value_effect_applies_to_target() {
        let field = FieldDescriptor::new("a", "text").linkage(
            LinkageConfig::new().effect(formwork_schema::LinkageEffect::set_value("b", 5)),
        );
        let engine = engine_for(vec![field]);
        let handle = Arc::new(MapHandle::default());

        engine
            .execute_effects("a", &ValueMap::new(), handle.clone())
            .await;
        assert_eq!(handle.get_field_value("b"), Some(json!(5)));
    }

    #[tokio::test]
    async fn effect_when_gate_skips_but_still_resolves() {
        let field = FieldDescriptor::new("a", "text").linkage(
            LinkageConfig::new().effect(
                formwork_schema::LinkageEffect::set_value("b", 5)
                    .when(ConditionExpr::leaf("a", "=", "go")),
            ),
        );
        let engine = engine_for(vec![field]);
        let handle = Arc::new(MapHandle::default());

        engine
            .execute_effects("a", &values(&[("a", json!("stop"))]), handle.clone())
            .await;
        assert_eq!(handle.get_field_value("b"), None);

        engine
            .execute_effects("a", &values(&[("a", json!("go"))]), handle.clone())
            .await;
        assert_eq!(handle.get_field_value("b"), Some(json!(5)));
    }

    #[tokio::test]
    async fn clear_and_validate_effects() {
        let field = FieldDescriptor::new("a", "text").linkage(
            LinkageConfig::new()
                .effect(formwork_schema::LinkageEffect::clear("b"))
                .effect(formwork_schema::LinkageEffect::validate("c")),
        );
        let engine = engine_for(vec![field]);
        let handle = Arc::new(MapHandle::default());
        handle.set_field_value("b", json!("stale"));

        engine
            .execute_effects("a", &ValueMap::new(), handle.clone())
            .await;
        assert_eq!(handle.get_field_value("b"), None);
        assert_eq!(*handle.validated.lock().unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn effect_function_overrides_literal_value() {
        let field = FieldDescriptor::new("a", "text").linkage(LinkageConfig::new().effect({
            let mut effect = formwork_schema::LinkageEffect::set_value("b", 0);
            effect.effect = Some(Arc::new(|values, target| {
                Ok(json!(format!(
                    "{}:{}",
                    target,
                    values.get("a").and_then(|v| v.as_str()).unwrap_or("")
                )))
            }));
            effect
        }));
        let engine = engine_for(vec![field]);
        let handle = Arc::new(MapHandle::default());

        engine
            .execute_effects("a", &values(&[("a", json!("hello"))]), handle.clone())
            .await;
        assert_eq!(handle.get_field_value("b"), Some(json!("b:hello")));
    }

    #[tokio::test]
    async fn multi_target_effect_writes_every_target() {
        let field = FieldDescriptor::new("a", "text").linkage(LinkageConfig::new().effect({
            let mut effect = formwork_schema::LinkageEffect::set_value("b", 1);
            effect.target = vec!["b".to_string(), "c".to_string()];
            effect
        }));
        let engine = engine_for(vec![field]);
        let handle = Arc::new(MapHandle::default());

        engine
            .execute_effects("a", &ValueMap::new(), handle.clone())
            .await;
        assert_eq!(handle.get_field_value("b"), Some(json!(1)));
        assert_eq!(handle.get_field_value("c"), Some(json!(1)));
    }

    #[tokio::test]
    async fn resolution_is_index_based_not_completion_based() {
        // First effect has the longer delay; the future resolves once the
        // LAST-index effect (short delay) fires, while the first is pending.
        let field = FieldDescriptor::new("a", "text").linkage(
            LinkageConfig::new()
                .effect(formwork_schema::LinkageEffect::set_value("slow", 1).delay(150))
                .effect(formwork_schema::LinkageEffect::set_value("fast", 2)),
        );
        let engine = engine_for(vec![field]);
        let handle = Arc::new(MapHandle::default());

        engine
            .execute_effects("a", &ValueMap::new(), handle.clone())
            .await;
        assert_eq!(handle.get_field_value("fast"), Some(json!(2)));
        // The slow effect's timer is still pending at resolution time.
        assert_eq!(handle.get_field_value("slow"), None);

        // It still fires eventually -- there is no cancellation.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(handle.get_field_value("slow"), Some(json!(1)));
    }

    #[tokio::test]
    async fn no_effects_resolves_immediately() {
        let engine = engine_for(vec![FieldDescriptor::new("a", "text")]);
        engine
            .execute_effects("a", &ValueMap::new(), Arc::new(MapHandle::default()))
            .await;
    }

    #[test]
    fn get_dependencies_reads_the_graph() {
        let field = FieldDescriptor::new("district", "select")
            .linkage(LinkageConfig::new().depends_on(["city"]));
        let engine = engine_for(vec![field]);
        assert_eq!(engine.get_dependencies("district"), vec!["city"]);
        assert!(engine.get_dependencies("ghost").is_empty());
    }
}
