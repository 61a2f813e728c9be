//! Dependency graph construction.
//!
//! Maps each field to the set of fields whose change must trigger
//! recomputation of its props, rules, visibility, or value. Rebuilt whenever
//! the active field set changes (dynamic fields appearing or disappearing),
//! so construction stays O(fields).

use std::collections::{BTreeMap, BTreeSet};

use formwork_schema::FieldKey;

use crate::resolver::ActiveField;

/// Field name -> fields that, when changed, invalidate this field's
/// computed state.
pub type DependencyGraph = BTreeMap<FieldKey, BTreeSet<FieldKey>>;

/// Build the graph for the active field list.
///
/// Trigger keys per field are the union of its linkage dependencies, the
/// field named by its legacy condition, its legacy top-level dependency
/// list, and -- for generated fields -- the watched keys of the dependency
/// chain that materialized it.
pub fn build(active: &[ActiveField]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for field in active {
        let descriptor = &field.descriptor;
        let mut triggers = BTreeSet::new();

        triggers.extend(descriptor.dependencies.iter().cloned());
        if let Some(condition) = &descriptor.condition {
            triggers.insert(condition.field.clone());
        }
        if let Some(linkage) = &descriptor.linkage {
            triggers.extend(linkage.dependencies.iter().cloned());
        }
        triggers.extend(field.watched.iter().cloned());

        if !triggers.is_empty() {
            graph.insert(descriptor.name.clone(), triggers);
        }
    }

    graph
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
