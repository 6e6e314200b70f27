//! State schema: field declarations, defaults, and the merge surface
//!
//! A [`StateSchema`] declares the named fields of a workflow's state. Each
//! field optionally carries an advisory type tag (not enforced at runtime),
//! a [`Reducer`] deciding how writes fold into the field, and a default
//! seeding the initial state. Fields without a reducer are last-value
//! slots.
//!
//! [`StateSchema::apply`] is the **only** merge surface the engine invokes;
//! every update — node output, Send overlay, manual `update_state` — flows
//! through it.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::schema::{FieldSpec, StateSchema};
//! use weft_core::reducers::SumConcatReducer;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let schema = StateSchema::new()
//!     .with_field(FieldSpec::new("items")
//!         .with_reducer(Arc::new(SumConcatReducer))
//!         .with_default(json!([])))
//!     .with_field(FieldSpec::new("status"));
//!
//! let mut state = schema.initial_state();
//! schema.apply(&mut state, &json!({"items": [1], "status": "running"}))?;
//! schema.apply(&mut state, &json!({"items": [2]}))?;
//! // state == {"items": [1, 2], "status": "running"}
//! ```

use crate::reducers::{Reducer, StateError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Declaration of one state field
#[derive(Clone)]
pub struct FieldSpec {
    /// Unique field name
    pub name: String,

    /// Advisory type tag; recorded but never enforced
    pub type_tag: Option<String>,

    /// Merge function for this field; absent means last-value
    pub reducer: Option<Arc<dyn Reducer>>,

    /// Default seeding the initial state; deep-copied per invocation so
    /// runs never alias each other's values
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: None,
            reducer: None,
            default: None,
        }
    }

    pub fn with_type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }

    pub fn with_reducer(mut self, reducer: Arc<dyn Reducer>) -> Self {
        self.reducer = Some(reducer);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .field("reducer", &self.reducer.as_ref().map(|r| r.name().to_string()))
            .field("default", &self.default)
            .finish()
    }
}

/// Declaration of all state fields, in declaration order
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    order: Vec<String>,
    fields: HashMap<String, FieldSpec>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field declaration. Panics on a duplicate name — schemas are
    /// built once at startup and a duplicate is a programming error the
    /// builder also rejects.
    pub fn with_field(mut self, spec: FieldSpec) -> Self {
        assert!(
            !self.fields.contains_key(&spec.name),
            "duplicate schema field '{}'",
            spec.name
        );
        self.order.push(spec.name.clone());
        self.fields.insert(spec.name.clone(), spec);
        self
    }

    /// Fallible variant of [`with_field`](Self::with_field) for callers
    /// assembling schemas from external declarations.
    pub fn add_field(&mut self, spec: FieldSpec) -> Result<(), StateError> {
        if self.fields.contains_key(&spec.name) {
            return Err(StateError::InvalidSchema(format!(
                "duplicate field '{}'",
                spec.name
            )));
        }
        self.order.push(spec.name.clone());
        self.fields.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> &[String] {
        &self.order
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Whether `name` declares a reducer. Fields without one — including
    /// fields never declared — are last-value slots.
    pub fn has_reducer(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .map(|f| f.reducer.is_some())
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Fresh initial state: every declared field mapped to a deep copy of
    /// its default, or null.
    pub fn initial_state(&self) -> Value {
        let mut state = serde_json::Map::new();
        for name in &self.order {
            let default = self.fields[name]
                .default
                .clone()
                .unwrap_or(Value::Null);
            state.insert(name.clone(), default);
        }
        Value::Object(state)
    }

    /// Fold `updates` into `state`, field by field: through the field's
    /// reducer when one is declared, last-value otherwise. Updates to keys
    /// the schema never declared are stored last-value.
    pub fn apply(&self, state: &mut Value, updates: &Value) -> Result<(), StateError> {
        let updates = updates
            .as_object()
            .ok_or_else(|| StateError::InvalidState("update must be an object".to_string()))?;
        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;

        for (key, incoming) in updates {
            let merged = match self.fields.get(key).and_then(|f| f.reducer.as_ref()) {
                Some(reducer) => {
                    let current = state_obj.get(key).cloned().unwrap_or(Value::Null);
                    reducer.reduce(&current, incoming)?
                }
                None => incoming.clone(),
            };
            state_obj.insert(key.clone(), merged);
        }
        Ok(())
    }
}
