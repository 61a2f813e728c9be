//! Shared form state and the runtime's `FormHandle` implementation.
//!
//! All mutation funnels through [`SharedFormHandle`]; generators and effect
//! functions receive it as their window into the form. Writes through the
//! handle refresh the active field set (dynamic fields may appear or
//! disappear) but never fire linkage effects -- effects fire only for
//! changes entering through `FormRuntime::set_value`, so an effect writing
//! a value cannot re-trigger itself.

use std::sync::{Arc, Mutex};

use formwork_schema::{FormHandle, Schema, ValidationErrors, ValueMap};
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::engine::LinkageEngine;
use crate::resolver::{self, ActiveField};
use crate::validate;

pub(crate) struct FormInner {
    pub(crate) schema: Arc<Schema>,
    pub(crate) config: RuntimeConfig,
    pub(crate) values: ValueMap,
    pub(crate) initial_values: ValueMap,
    pub(crate) errors: ValidationErrors,
    pub(crate) active: Vec<ActiveField>,
    pub(crate) engine: Arc<LinkageEngine>,
    pub(crate) on_finish: Option<Arc<dyn Fn(&ValueMap) + Send + Sync>>,
}

/// Cloneable handle onto one mounted form's shared state.
#[derive(Clone)]
pub struct SharedFormHandle {
    pub(crate) inner: Arc<Mutex<FormInner>>,
}

impl SharedFormHandle {
    /// Re-resolve the active field set against the current values and
    /// rebuild the linkage engine for it. The props cache carries over --
    /// it is invalidated only by an explicit clear.
    ///
    /// The state lock is NOT held while generators run, so generators may
    /// call back into the handle.
    pub(crate) fn refresh(&self) {
        let (schema, config, values) = {
            let inner = self.inner.lock().unwrap();
            (
                inner.schema.clone(),
                inner.config.clone(),
                inner.values.clone(),
            )
        };

        let active = resolver::resolve(&schema, &values, self, config.max_generation_depth);

        let mut inner = self.inner.lock().unwrap();
        let engine = LinkageEngine::rebuilt(&active, Some(inner.engine.as_ref()));
        inner.active = active;
        inner.engine = Arc::new(engine);
    }

    pub(crate) fn snapshot(&self) -> (Vec<ActiveField>, Arc<LinkageEngine>, ValueMap) {
        let inner = self.inner.lock().unwrap();
        (inner.active.clone(), inner.engine.clone(), inner.values.clone())
    }
}

impl FormHandle for SharedFormHandle {
    fn get_field_value(&self, name: &str) -> Option<Value> {
        self.inner.lock().unwrap().values.get(name).cloned()
    }

    fn get_fields_value(&self) -> ValueMap {
        self.inner.lock().unwrap().values.clone()
    }

    fn set_field_value(&self, name: &str, value: Value) {
        self.inner
            .lock()
            .unwrap()
            .values
            .insert(name.to_string(), value);
        self.refresh();
    }

    fn clear_field_value(&self, name: &str) {
        self.inner.lock().unwrap().values.remove(name);
        self.refresh();
    }

    fn set_fields_value(&self, values: ValueMap) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.values.extend(values);
            // Bulk writes invalidate nothing implicitly; drop the cache
            // wholesale as the engine contract requires.
            inner.engine.clear_cache();
        }
        self.refresh();
    }

    fn validate_fields(&self, names: Option<&[String]>) -> Result<(), ValidationErrors> {
        let (active, engine, values) = self.snapshot();
        let errors = validate::validate_form(&active, &engine, &values, names);

        {
            let mut inner = self.inner.lock().unwrap();
            match names {
                Some(names) => {
                    for name in names {
                        inner.errors.remove(name);
                    }
                    inner.errors.extend(errors.clone());
                }
                None => inner.errors = errors.clone(),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn reset_fields(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.values = inner.initial_values.clone();
            inner.errors.clear();
        }
        self.refresh();
    }

    fn submit(&self) {
        if self.validate_fields(None).is_ok() {
            let (values, on_finish) = {
                let inner = self.inner.lock().unwrap();
                (inner.values.clone(), inner.on_finish.clone())
            };
            if let Some(on_finish) = on_finish {
                on_finish(&values);
            }
        }
    }
}
