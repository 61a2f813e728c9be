//! Formwork linkage engine -- schema-driven dynamic form runtime.
//!
//! Consumes a [`formwork_schema::Schema`] and keeps a mounted form's state
//! reactive: condition evaluation, dependency graphs, dynamic field
//! generation, computed props/options/rules/values, and linkage effect
//! execution. Rendering dispatches through a pluggable renderer registry;
//! the produced [`UiNode`]s are headless -- the host maps them onto real
//! widgets and reports value changes back through [`FormRuntime::set_value`].
//!
//! A misconfigured schema degrades silently (missing fields, unchanged
//! values, empty option lists) rather than failing the form: schema-author
//! callbacks are caught, logged, and treated as contributing nothing.

pub mod coerce;
pub mod condition;
pub mod config;
pub mod engine;
pub mod expr;
pub mod form;
pub mod graph;
pub mod handle;
pub mod registry;
pub mod resolver;
pub mod validate;

pub use condition::evaluate;
pub use config::RuntimeConfig;
pub use engine::{ComputedProps, LinkageEngine};
pub use expr::{evaluate_expression, ExprError};
pub use form::{FormRuntime, RenderedField};
pub use graph::DependencyGraph;
pub use handle::SharedFormHandle;
pub use registry::{RenderProps, Renderer, RendererRegistry, TextRenderer, UiNode};
pub use resolver::ActiveField;
