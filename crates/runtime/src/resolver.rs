//! Dynamic field resolution.
//!
//! Dependency pseudo-fields generate further field descriptors from the
//! values they watch. Resolution is a tree-expansion pass: each generator
//! receives the value subset restricted to its watched keys plus the form
//! handle, and may itself return nested dependency nodes, which are expanded
//! recursively up to the configured depth. The engine does not detect
//! cycles; the depth guard bounds runaway mutual recursion.
//!
//! The active field list for a render pass is the static fields followed by
//! the generated fields, each partition in declaration order.

use std::collections::BTreeSet;

use formwork_schema::{DependencyField, FieldDescriptor, FieldKey, FormHandle, Schema, SchemaNode, ValueMap};
use tracing::warn;

/// One entry of the active field list: the descriptor plus, for generated
/// fields, the watched keys inherited from the dependency chain that
/// produced it.
#[derive(Debug, Clone)]
pub struct ActiveField {
    pub descriptor: FieldDescriptor,
    pub generated: bool,
    /// Watched keys of the generating dependency chain; empty for static
    /// fields. Materialized fields inherit these as extra dependencies.
    pub watched: Vec<FieldKey>,
}

/// Resolve the currently-active field list: static fields first, then the
/// fields generated by each dependency descriptor in declaration order.
pub fn resolve(
    schema: &Schema,
    values: &ValueMap,
    handle: &dyn FormHandle,
    max_depth: usize,
) -> Vec<ActiveField> {
    let mut active: Vec<ActiveField> = schema
        .fields()
        .iter()
        .map(|field| ActiveField {
            descriptor: field.clone(),
            generated: false,
            watched: Vec::new(),
        })
        .collect();

    for dep in schema.dependency_fields() {
        expand(dep, values, handle, &dep.watched, 0, max_depth, &mut active);
    }

    active
}

fn expand(
    dep: &DependencyField,
    values: &ValueMap,
    handle: &dyn FormHandle,
    inherited_watched: &[FieldKey],
    depth: usize,
    max_depth: usize,
    out: &mut Vec<ActiveField>,
) {
    if depth >= max_depth {
        warn!(
            watched = ?dep.watched,
            max_depth,
            "dependency field expansion exceeded the depth guard; stopping"
        );
        return;
    }

    // Generators see only the values they declared a dependency on.
    let subset: ValueMap = dep
        .watched
        .iter()
        .filter_map(|key| values.get(key).map(|v| (key.clone(), v.clone())))
        .collect();

    let nodes = match (dep.generate)(&subset, handle) {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!(watched = ?dep.watched, error = %e, "dependency field generator failed");
            return;
        }
    };

    for node in nodes {
        match node {
            SchemaNode::Field(descriptor) => out.push(ActiveField {
                descriptor,
                generated: true,
                watched: inherited_watched.to_vec(),
            }),
            SchemaNode::Dependency(nested) => {
                let mut watched = inherited_watched.to_vec();
                for key in &nested.watched {
                    if !watched.contains(key) {
                        watched.push(key.clone());
                    }
                }
                expand(&nested, values, handle, &watched, depth + 1, max_depth, out);
            }
        }
    }
}

/// Union of all watched keys across the schema's top-level dependency
/// descriptors and the currently-active generated fields. A change to any
/// of these keys requires re-resolution.
pub fn watched_union(schema: &Schema, active: &[ActiveField]) -> BTreeSet<FieldKey> {
    let mut union = BTreeSet::new();
    for dep in schema.dependency_fields() {
        union.extend(dep.watched.iter().cloned());
    }
    for field in active {
        union.extend(field.watched.iter().cloned());
    }
    union
}

/// True when any watched key differs between the previous and current value
/// maps (including keys appearing or disappearing).
pub fn watched_changed(prev: &ValueMap, next: &ValueMap, watched: &BTreeSet<FieldKey>) -> bool {
    watched.iter().any(|key| prev.get(key) != next.get(key))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_schema::{FieldDescriptor, Schema, ValidationErrors};
    use serde_json::json;

    /// A handle stub for resolver tests: generators here don't touch it.
    struct NoopHandle;

    impl FormHandle for NoopHandle {
        fn get_field_value(&self, _name: &str) -> Option<serde_json::Value> {
            None
        }
        fn get_fields_value(&self) -> ValueMap {
            ValueMap::new()
        }
        fn set_field_value(&self, _name: &str, _value: serde_json::Value) {}
        fn clear_field_value(&self, _name: &str) {}
        fn set_fields_value(&self, _values: ValueMap) {}
        fn validate_fields(&self, _names: Option<&[String]>) -> Result<(), ValidationErrors> {
            Ok(())
        }
        fn reset_fields(&self) {}
        fn submit(&self) {}
    }

    fn city_district_schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::new("city", "select").into(),
            DependencyField::new(vec!["city".to_string()], |subset, _| {
                let mut fields = Vec::new();
                if subset.get("city") == Some(&json!("beijing")) {
                    fields.push(FieldDescriptor::new("district", "select").into());
                }
                Ok(fields)
            })
            .into(),
        ])
    }

    fn values(pairs: &[(&str, serde_json::Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn generated_field_appears_and_disappears() {
        let schema = city_district_schema();

        let beijing = resolve(&schema, &values(&[("city", json!("beijing"))]), &NoopHandle, 16);
        assert!(beijing.iter().any(|f| f.descriptor.name == "district"));

        let shanghai = resolve(&schema, &values(&[("city", json!("shanghai"))]), &NoopHandle, 16);
        assert!(!shanghai.iter().any(|f| f.descriptor.name == "district"));
    }

    #[test]
    fn resolution_is_idempotent_for_unchanged_values() {
        let schema = city_district_schema();
        let vals = values(&[("city", json!("beijing"))]);
        let first = resolve(&schema, &vals, &NoopHandle, 16);
        let second = resolve(&schema, &vals, &NoopHandle, 16);
        let names = |fields: &[ActiveField]| {
            fields
                .iter()
                .map(|f| f.descriptor.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn generated_fields_inherit_watched_keys() {
        let schema = city_district_schema();
        let active = resolve(&schema, &values(&[("city", json!("beijing"))]), &NoopHandle, 16);
        let district = active
            .iter()
            .find(|f| f.descriptor.name == "district")
            .unwrap();
        assert!(district.generated);
        assert_eq!(district.watched, vec!["city"]);
    }

    #[test]
    fn nested_dependency_nodes_expand() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("kind", "select").into(),
            DependencyField::new(vec!["kind".to_string()], |subset, _| {
                if subset.get("kind") == Some(&json!("nested")) {
                    Ok(vec![DependencyField::new(vec!["detail".to_string()], |_, _| {
                        Ok(vec![FieldDescriptor::new("leaf", "text").into()])
                    })
                    .into()])
                } else {
                    Ok(Vec::new())
                }
            })
            .into(),
        ]);
        let active = resolve(&schema, &values(&[("kind", json!("nested"))]), &NoopHandle, 16);
        let leaf = active.iter().find(|f| f.descriptor.name == "leaf").unwrap();
        // Watched keys accumulate down the chain.
        assert_eq!(leaf.watched, vec!["kind", "detail"]);
    }

    #[test]
    fn depth_guard_stops_runaway_recursion() {
        // A generator that regenerates itself forever.
        fn looping() -> DependencyField {
            DependencyField::new(vec!["x".to_string()], |_, _| Ok(vec![looping().into()]))
        }
        let schema = Schema::new(vec![looping().into()]);
        // Terminates thanks to the guard; produces no fields.
        let active = resolve(&schema, &ValueMap::new(), &NoopHandle, 8);
        assert!(active.is_empty());
    }

    #[test]
    fn generator_error_contributes_nothing() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("a", "text").into(),
            DependencyField::new(vec!["a".to_string()], |_, _| Err("boom".into())).into(),
        ]);
        let active = resolve(&schema, &ValueMap::new(), &NoopHandle, 16);
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn watched_change_detection() {
        let schema = city_district_schema();
        let active = resolve(&schema, &ValueMap::new(), &NoopHandle, 16);
        let watched = watched_union(&schema, &active);
        assert!(watched.contains("city"));

        let prev = values(&[("city", json!("beijing")), ("other", json!(1))]);
        let mut next = prev.clone();
        next.insert("other".to_string(), json!(2));
        assert!(!watched_changed(&prev, &next, &watched));
        next.insert("city".to_string(), json!("shanghai"));
        assert!(watched_changed(&prev, &next, &watched));
    }
}
