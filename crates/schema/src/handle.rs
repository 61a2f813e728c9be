//! The form handle: the mutation surface handed to schema-author code.
//!
//! Generators, effect functions, and host integrations receive a
//! `&dyn FormHandle` (or an `Arc` of one). These methods are the only way
//! schema-author code may read or mutate the value map.

use std::collections::BTreeMap;

use crate::value::{FieldKey, ValueMap};

/// Per-field validation failure messages.
pub type ValidationErrors = BTreeMap<FieldKey, String>;

/// Handle into a mounted form. Implemented by the runtime; cloneable there.
///
/// Programmatic writes through the handle update the value map and refresh
/// the active field set, but do NOT fire linkage effects -- effects fire only
/// for value changes entering through the runtime's change notification, so
/// an effect writing a value cannot re-trigger itself.
pub trait FormHandle: Send + Sync {
    /// Current value of one field, if set.
    fn get_field_value(&self, name: &str) -> Option<serde_json::Value>;

    /// Snapshot of all current values.
    fn get_fields_value(&self) -> ValueMap;

    /// Write one field value.
    fn set_field_value(&self, name: &str, value: serde_json::Value);

    /// Remove one field's value entirely (the `clear` effect semantics).
    fn clear_field_value(&self, name: &str);

    /// Bulk write. Callers doing bulk writes must clear the linkage
    /// engine's computation cache afterwards; the runtime's implementation
    /// does this itself.
    fn set_fields_value(&self, values: ValueMap);

    /// Validate the named fields (all visible fields when `None`).
    fn validate_fields(&self, names: Option<&[FieldKey]>) -> Result<(), ValidationErrors>;

    /// Reset all values to the form's initial values.
    fn reset_fields(&self);

    /// Validate everything and, on success, deliver the values to the
    /// form's submit callback.
    fn submit(&self);
}
