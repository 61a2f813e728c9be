//! Renderer registry: component-type tag -> render function.
//!
//! A flat dispatch table replacing widget inheritance hierarchies. The
//! registry is an explicitly constructed instance passed by reference into
//! each form runtime -- there is no process-wide singleton. A composition
//! root typically builds one with [`RendererRegistry::with_defaults`] and
//! shares it across forms.
//!
//! Lookup falls back to the `"text"` renderer when the requested tag is
//! unregistered; with no fallback registered the lookup yields nothing and
//! the caller logs a warning for the field.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use formwork_schema::{OptionItem, ValueMap};
use serde_json::Value;

/// Everything a renderer sees for one field in one render pass. Value
/// changes flow back through the form runtime, not through the renderer.
#[derive(Debug, Clone)]
pub struct RenderProps {
    pub name: String,
    pub component_type: String,
    pub value: Option<Value>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub help: Option<String>,
    pub disabled: bool,
    pub required: bool,
    pub options: Vec<OptionItem>,
    /// Merged component props: the descriptor's static props overlaid with
    /// the linkage-computed patch.
    pub props: BTreeMap<String, Value>,
    /// Snapshot of the full value map, for renderers that cross-reference
    /// other fields.
    pub values: ValueMap,
}

/// Headless UI output for one field. The host maps this onto real widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct UiNode {
    pub component: String,
    pub label: Option<String>,
    pub value: Option<Value>,
    pub props: BTreeMap<String, Value>,
    pub options: Vec<OptionItem>,
}

/// Produces UI output for one component type.
pub trait Renderer: Send + Sync {
    fn render(&self, props: &RenderProps) -> UiNode;
}

/// The default renderer: passes the field through as a plain node. Registered
/// under `"text"` by [`RendererRegistry::with_defaults`], which also makes it
/// the fallback for unknown tags.
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, props: &RenderProps) -> UiNode {
        UiNode {
            component: props.component_type.clone(),
            label: props.label.clone(),
            value: props.value.clone(),
            props: props.props.clone(),
            options: props.options.clone(),
        }
    }
}

/// Component-type tag -> renderer table. Registration is idempotent
/// overwrite: the last registration for a tag wins.
#[derive(Default)]
pub struct RendererRegistry {
    renderers: RwLock<BTreeMap<String, Arc<dyn Renderer>>>,
}

impl RendererRegistry {
    /// An empty registry: every lookup misses until something registers.
    pub fn new() -> Self {
        RendererRegistry::default()
    }

    /// A registry with the `"text"` fallback renderer installed.
    pub fn with_defaults() -> Self {
        let registry = RendererRegistry::new();
        registry.register("text", Arc::new(TextRenderer));
        registry
    }

    pub fn register(&self, component_type: impl Into<String>, renderer: Arc<dyn Renderer>) {
        self.renderers
            .write()
            .unwrap()
            .insert(component_type.into(), renderer);
    }

    pub fn unregister(&self, component_type: &str) {
        self.renderers.write().unwrap().remove(component_type);
    }

    pub fn clear(&self) {
        self.renderers.write().unwrap().clear();
    }

    /// Look up the renderer for a tag, falling back to `"text"`.
    pub fn get(&self, component_type: &str) -> Option<Arc<dyn Renderer>> {
        let renderers = self.renderers.read().unwrap();
        renderers
            .get(component_type)
            .or_else(|| renderers.get("text"))
            .cloned()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn props(component_type: &str) -> RenderProps {
        RenderProps {
            name: "x".to_string(),
            component_type: component_type.to_string(),
            value: Some(serde_json::json!("v")),
            label: Some("X".to_string()),
            placeholder: None,
            help: None,
            disabled: false,
            required: false,
            options: Vec::new(),
            props: BTreeMap::new(),
            values: ValueMap::new(),
        }
    }

    struct MarkerRenderer(&'static str);

    impl Renderer for MarkerRenderer {
        fn render(&self, props: &RenderProps) -> UiNode {
            UiNode {
                component: self.0.to_string(),
                label: props.label.clone(),
                value: props.value.clone(),
                props: BTreeMap::new(),
                options: Vec::new(),
            }
        }
    }

    #[test]
    fn unknown_tag_falls_back_to_text() {
        let registry = RendererRegistry::with_defaults();
        let renderer = registry.get("holographic-picker").unwrap();
        let node = renderer.render(&props("holographic-picker"));
        assert_eq!(node.component, "holographic-picker");
    }

    #[test]
    fn unregister_restores_fallback_then_nothing() {
        let registry = RendererRegistry::with_defaults();
        registry.register("date", Arc::new(MarkerRenderer("date-widget")));
        let node = registry.get("date").unwrap().render(&props("date"));
        assert_eq!(node.component, "date-widget");

        registry.unregister("date");
        let node = registry.get("date").unwrap().render(&props("date"));
        assert_eq!(node.component, "date");

        registry.clear();
        assert!(registry.get("date").is_none());
        assert!(registry.get("text").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let registry = RendererRegistry::new();
        registry.register("select", Arc::new(MarkerRenderer("first")));
        registry.register("select", Arc::new(MarkerRenderer("second")));
        let node = registry.get("select").unwrap().render(&props("select"));
        assert_eq!(node.component, "second");
    }
}
