//! Formwork schema data model -- declarative field descriptors, linkage
//! configuration, condition expressions, and validation rules.
//!
//! A form is described as a flat list of [`SchemaNode`]s instead of
//! imperative UI code. Regular nodes describe one rendered field; dependency
//! nodes generate further nodes from the values they watch. The runtime
//! crate consumes this model; nothing here renders or evaluates anything.

pub mod condition;
pub mod error;
pub mod field;
pub mod handle;
pub mod linkage;
mod parse;
pub mod rule;
pub mod value;

pub use condition::{CompositeCondition, ConditionExpr, CustomPredicate, FieldCondition};
pub use error::{CallbackError, SchemaError};
pub use field::{DependencyField, FieldDescriptor, GenerateFn, Schema, SchemaNode};
pub use handle::{FormHandle, ValidationErrors};
pub use linkage::{
    EffectFn, EffectKind, LinkageConfig, LinkageEffect, LinkageProps, OptionsLoader, OptionsSpec,
    RulesSpec, StaticOptions, ValueCompute, ValueComputeFn, ValuesFn,
};
pub use rule::{Rule, RuleKind, ValidatorFn};
pub use value::{FieldKey, OptionItem, ValueMap};
