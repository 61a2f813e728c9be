//! The form runtime: orchestrates one render pass and one value change.
//!
//! A value change flows: derive the written value (`valueCompute`), update
//! the value map, re-resolve dynamic fields when a watched key changed,
//! execute the changed field's effects, and leave the (possibly changed)
//! active field set ready for the next render. Rendering merges static and
//! computed state per field and dispatches through the renderer registry;
//! the actual redraw belongs to the host.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use formwork_schema::{
    FormHandle, OptionItem, Rule, Schema, ValidationErrors, ValueMap,
};
use serde_json::Value;
use tracing::warn;

use crate::config::RuntimeConfig;
use crate::engine::LinkageEngine;
use crate::handle::{FormInner, SharedFormHandle};
use crate::registry::{RenderProps, RendererRegistry, UiNode};
use crate::resolver;
use crate::validate;

/// One visible field of a render pass, with every computed attribute merged.
#[derive(Debug, Clone)]
pub struct RenderedField {
    pub name: String,
    pub component_type: String,
    pub title: Option<String>,
    pub placeholder: Option<String>,
    pub help: Option<String>,
    pub required: bool,
    pub disabled: bool,
    pub value: Option<Value>,
    pub options: Vec<OptionItem>,
    pub rules: Vec<Rule>,
    /// Static component props overlaid with the linkage-computed patch.
    pub props: BTreeMap<String, Value>,
    pub node: UiNode,
}

/// A mounted form: schema, state, engine, and renderer registry.
pub struct FormRuntime {
    handle: SharedFormHandle,
    registry: Arc<RendererRegistry>,
}

impl FormRuntime {
    pub fn new(schema: Schema, registry: Arc<RendererRegistry>) -> Self {
        FormRuntime::with_config(schema, registry, RuntimeConfig::default())
    }

    pub fn with_config(
        schema: Schema,
        registry: Arc<RendererRegistry>,
        config: RuntimeConfig,
    ) -> Self {
        let values = schema.default_values();
        let inner = FormInner {
            schema: Arc::new(schema),
            config,
            values: values.clone(),
            initial_values: values,
            errors: ValidationErrors::new(),
            active: Vec::new(),
            engine: Arc::new(LinkageEngine::new(&[])),
            on_finish: None,
        };
        let handle = SharedFormHandle {
            inner: Arc::new(Mutex::new(inner)),
        };
        handle.refresh();
        FormRuntime { handle, registry }
    }

    /// Overlay caller-supplied initial values onto the per-type defaults.
    pub fn with_initial_values(self, values: ValueMap) -> Self {
        {
            let mut inner = self.handle.inner.lock().unwrap();
            inner.values.extend(values);
            inner.initial_values = inner.values.clone();
        }
        self.handle.refresh();
        self
    }

    /// Callback invoked with the values after a successful submit.
    pub fn on_finish<F>(self, callback: F) -> Self
    where
        F: Fn(&ValueMap) + Send + Sync + 'static,
    {
        self.handle.inner.lock().unwrap().on_finish = Some(Arc::new(callback));
        self
    }

    /// A cloneable handle for schema-author code and host integrations.
    pub fn handle(&self) -> SharedFormHandle {
        self.handle.clone()
    }

    pub fn values(&self) -> ValueMap {
        self.handle.get_fields_value()
    }

    pub fn errors(&self) -> ValidationErrors {
        self.handle.inner.lock().unwrap().errors.clone()
    }

    /// The UI change entry point for one field.
    ///
    /// Applies the field's value derivation to the incoming value, writes
    /// it, re-resolves dynamic fields when a watched key changed, then
    /// executes the field's effects. Resolution of the returned future
    /// follows the effect executor's last-index semantics.
    pub async fn set_value(&self, field: &str, value: Value) {
        let needs_refresh = {
            let mut inner = self.handle.inner.lock().unwrap();
            let computed = inner
                .engine
                .compute_value(field, &inner.values, Some(&value))
                .unwrap_or(value);

            let prev = inner.values.clone();
            inner.values.insert(field.to_string(), computed);

            let watched = resolver::watched_union(&inner.schema, &inner.active);
            resolver::watched_changed(&prev, &inner.values, &watched)
        };

        if needs_refresh {
            self.handle.refresh();
        }

        let effects = {
            let inner = self.handle.inner.lock().unwrap();
            inner.engine.execute_effects(
                field,
                &inner.values,
                Arc::new(self.handle.clone()),
            )
        };
        effects.await;
    }

    /// Produce the current render pass: every visible active field with its
    /// computed attributes and renderer output. Fields whose component type
    /// resolves to no renderer are logged and omitted.
    pub async fn render(&self) -> Vec<RenderedField> {
        let (active, engine, values) = self.handle.snapshot();
        let mut rendered = Vec::with_capacity(active.len());

        for field in &active {
            let descriptor = &field.descriptor;
            let name = &descriptor.name;

            if !engine.should_show_field(name, &values) {
                continue;
            }

            let computed = engine.compute_props(name, &values);
            let get_str = |key: &str| {
                computed
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            };

            let title = get_str("title").or_else(|| descriptor.title.clone());
            let placeholder = get_str("placeholder").or_else(|| descriptor.placeholder.clone());
            let help = get_str("help").or_else(|| descriptor.tooltip.clone());
            let required = computed
                .get("required")
                .and_then(|v| v.as_bool())
                .unwrap_or(descriptor.required);
            let disabled = descriptor.disabled
                || computed
                    .get("disabled")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);

            let has_linkage_options = descriptor
                .linkage
                .as_ref()
                .is_some_and(|l| l.options.is_some());
            let options = if has_linkage_options {
                engine.compute_options(name, &values).await
            } else {
                descriptor.options.clone()
            };

            let rules = validate::field_rules(descriptor, engine.compute_rules(name, &values));

            let mut props = descriptor.component_props.clone();
            props.extend(computed.clone());

            let Some(renderer) = self.registry.get(&descriptor.component_type) else {
                warn!(
                    field = %name,
                    component_type = %descriptor.component_type,
                    "no renderer registered; field renders nothing"
                );
                continue;
            };

            let render_props = RenderProps {
                name: name.clone(),
                component_type: descriptor.component_type.clone(),
                value: values.get(name).cloned(),
                label: title.clone(),
                placeholder: placeholder.clone(),
                help: help.clone(),
                disabled,
                required,
                options: options.clone(),
                props: props.clone(),
                values: values.clone(),
            };
            let node = renderer.render(&render_props);

            rendered.push(RenderedField {
                name: name.clone(),
                component_type: descriptor.component_type.clone(),
                title,
                placeholder,
                help,
                required,
                disabled,
                value: values.get(name).cloned(),
                options,
                rules,
                props,
                node,
            });
        }

        rendered
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.handle.validate_fields(None)
    }

    pub fn reset(&self) {
        self.handle.reset_fields();
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_schema::{
        ConditionExpr, DependencyField, FieldDescriptor, LinkageConfig, LinkageEffect,
        ValueCompute,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Arc<RendererRegistry> {
        Arc::new(RendererRegistry::with_defaults())
    }

    #[tokio::test]
    async fn render_includes_defaults_and_visible_fields_only() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("name", "text").title("Name").into(),
            FieldDescriptor::new("vip_code", "text")
                .linkage(LinkageConfig::new().when(ConditionExpr::leaf("vip", "=", true)))
                .into(),
        ]);
        let form = FormRuntime::new(schema, registry());

        let fields = form.render().await;
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name"]);
        // Per-type default applied.
        assert_eq!(fields[0].value, Some(json!("")));

        form.set_value("vip", json!(true)).await;
        let fields = form.render().await;
        assert!(fields.iter().any(|f| f.name == "vip_code"));
    }

    #[tokio::test]
    async fn dynamic_fields_follow_watched_values() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("city", "select").into(),
            DependencyField::new(vec!["city".to_string()], |subset, _| {
                if subset.get("city") == Some(&json!("beijing")) {
                    Ok(vec![FieldDescriptor::new("district", "select").into()])
                } else {
                    Ok(Vec::new())
                }
            })
            .into(),
        ]);
        let form = FormRuntime::new(schema, registry());

        form.set_value("city", json!("beijing")).await;
        assert!(form.render().await.iter().any(|f| f.name == "district"));

        form.set_value("city", json!("shanghai")).await;
        assert!(!form.render().await.iter().any(|f| f.name == "district"));
    }

    #[tokio::test]
    async fn set_value_applies_value_derivation() {
        let mut linkage = LinkageConfig::new();
        linkage.value_compute = Some(ValueCompute {
            expression: Some("price * quantity".to_string()),
            function: None,
        });
        let schema = Schema::new(vec![
            FieldDescriptor::new("price", "number").into(),
            FieldDescriptor::new("quantity", "number").into(),
            FieldDescriptor::new("total", "number").linkage(linkage).into(),
        ]);
        let form = FormRuntime::new(schema, registry());

        form.set_value("price", json!(3)).await;
        form.set_value("quantity", json!(4)).await;
        // Whatever the widget sends for `total` is replaced by the derived value.
        form.set_value("total", json!(999)).await;
        assert_eq!(form.values()["total"], json!(12.0));
    }

    #[tokio::test]
    async fn change_fires_effects_on_owning_field() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("a", "text")
                .linkage(LinkageConfig::new().effect(LinkageEffect::set_value("b", 5)))
                .into(),
            FieldDescriptor::new("b", "number").into(),
        ]);
        let form = FormRuntime::new(schema, registry());

        form.set_value("a", json!("anything")).await;
        assert_eq!(form.handle().get_field_value("b"), Some(json!(5)));
    }

    #[tokio::test]
    async fn effect_writes_do_not_retrigger_effects() {
        // a -> sets b; b -> would set a to "looped" if effects cascaded.
        let schema = Schema::new(vec![
            FieldDescriptor::new("a", "text")
                .linkage(LinkageConfig::new().effect(LinkageEffect::set_value("b", 1)))
                .into(),
            FieldDescriptor::new("b", "number")
                .linkage(LinkageConfig::new().effect(LinkageEffect::set_value("a", "looped")))
                .into(),
        ]);
        let form = FormRuntime::new(schema, registry());

        form.set_value("a", json!("typed")).await;
        assert_eq!(form.handle().get_field_value("b"), Some(json!(1)));
        assert_eq!(form.handle().get_field_value("a"), Some(json!("typed")));
    }

    #[tokio::test]
    async fn renderer_miss_omits_field() {
        let schema = Schema::new(vec![FieldDescriptor::new("x", "hologram").into()]);
        // Empty registry: no fallback either.
        let form = FormRuntime::new(schema, Arc::new(RendererRegistry::new()));
        assert!(form.render().await.is_empty());
    }

    #[tokio::test]
    async fn bulk_write_clears_props_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut linkage = LinkageConfig::new();
        linkage.props.disabled = Some(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }));
        let schema = Schema::new(vec![FieldDescriptor::new("x", "text").linkage(linkage).into()]);
        let form = FormRuntime::new(schema, registry());

        form.render().await;
        form.render().await;
        let after_cached = calls.load(Ordering::SeqCst);
        assert_eq!(after_cached, 1);

        // Same values, but the bulk write dropped the cache.
        form.handle().set_fields_value(ValueMap::new());
        form.render().await;
        assert_eq!(calls.load(Ordering::SeqCst), after_cached + 1);
    }

    #[tokio::test]
    async fn submit_delivers_values_after_validation() {
        let received: Arc<Mutex<Option<ValueMap>>> = Arc::new(Mutex::new(None));
        let sink = received.clone();
        let schema = Schema::new(vec![FieldDescriptor::new("name", "text")
            .required()
            .into()]);
        let form = FormRuntime::new(schema, registry()).on_finish(move |values| {
            *sink.lock().unwrap() = Some(values.clone());
        });

        // Empty required field: submit withholds the callback.
        form.handle().submit();
        assert!(received.lock().unwrap().is_none());
        assert!(form.errors().contains_key("name"));

        form.set_value("name", json!("ada")).await;
        form.handle().submit();
        let delivered = received.lock().unwrap().clone().unwrap();
        assert_eq!(delivered["name"], json!("ada"));
    }

    #[tokio::test]
    async fn reset_restores_initial_values() {
        let schema = Schema::new(vec![FieldDescriptor::new("name", "text").into()]);
        let form = FormRuntime::new(schema, registry())
            .with_initial_values([("name".to_string(), json!("seed"))].into_iter().collect());

        form.set_value("name", json!("edited")).await;
        assert_eq!(form.values()["name"], json!("edited"));

        form.reset();
        assert_eq!(form.values()["name"], json!("seed"));
    }

    #[tokio::test]
    async fn generators_may_read_through_the_handle() {
        // The generator consults a field it does not watch, via the handle.
        let schema = Schema::new(vec![
            FieldDescriptor::new("mode", "select").into(),
            FieldDescriptor::new("flavor", "select").into(),
            DependencyField::new(vec!["mode".to_string()], |subset, handle| {
                let mut fields = Vec::new();
                if subset.get("mode") == Some(&json!("extra")) {
                    let flavor = handle
                        .get_field_value("flavor")
                        .and_then(|v| v.as_str().map(|s| s.to_string()))
                        .unwrap_or_default();
                    fields.push(
                        FieldDescriptor::new(format!("extra_{}", flavor), "text").into(),
                    );
                }
                Ok(fields)
            })
            .into(),
        ]);
        let form = FormRuntime::new(schema, registry());

        form.set_value("flavor", json!("mint")).await;
        form.set_value("mode", json!("extra")).await;
        assert!(form
            .render()
            .await
            .iter()
            .any(|f| f.name == "extra_mint"));
    }
}
