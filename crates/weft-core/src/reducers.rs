//! Reducers: binary merge functions for state fields
//!
//! A reducer decides how a field's incoming write folds into its current
//! value. When several nodes contribute to the same field in one superstep,
//! the engine folds their writes through the field's reducer in a
//! well-defined order; a field without a reducer is a last-value slot that
//! accepts at most one write per step.
//!
//! # Standard set
//!
//! | Reducer | Behavior |
//! |---------|----------|
//! | [`SumConcatReducer`] | numeric `+`; concatenation for arrays and strings |
//! | [`AppendReducer`] | wrap scalars into arrays, then concatenate |
//! | [`MergeReducer`] | shallow object merge, right wins on collisions |
//! | [`ReplaceReducer`] | discard current, keep incoming |
//! | [`MessageMergeReducer`] | ordered merge keyed by each item's `id` field |
//!
//! Reducers are pure: they never mutate their operands. A reducer may fail
//! on operands it cannot merge; the engine surfaces that as a step-fatal
//! error naming the field.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::reducers::{Reducer, SumConcatReducer};
//! use serde_json::json;
//!
//! let reducer = SumConcatReducer;
//! assert_eq!(reducer.reduce(&json!([1]), &json!([2])).unwrap(), json!([1, 2]));
//! assert_eq!(reducer.reduce(&json!(1), &json!(2)).unwrap(), json!(3));
//! ```

use serde_json::Value;
use thiserror::Error;

/// Errors raised while merging state values
#[derive(Debug, Error)]
pub enum StateError {
    /// A reducer received operands it cannot merge
    #[error("Reducer error: {0}")]
    Reducer(String),

    /// A state or update payload had the wrong shape
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A schema declaration was malformed (e.g. duplicate field)
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

/// Binary pure merge function: `reduce(current, incoming) -> merged`
pub trait Reducer: Send + Sync {
    /// Fold `incoming` into `current`, returning the merged value. Operands
    /// are never mutated.
    fn reduce(&self, current: &Value, incoming: &Value) -> Result<Value, StateError>;

    /// Short name used in diagnostics.
    fn name(&self) -> &str;
}

/// Numeric addition, sequence and string concatenation
///
/// A `null` current value adopts the incoming one, so fields without a
/// declared default still accumulate from their first write.
#[derive(Debug, Clone, Copy)]
pub struct SumConcatReducer;

impl Reducer for SumConcatReducer {
    fn reduce(&self, current: &Value, incoming: &Value) -> Result<Value, StateError> {
        match (current, incoming) {
            (Value::Null, _) => Ok(incoming.clone()),
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                    Ok(Value::Number((ai + bi).into()))
                } else if let (Some(af), Some(bf)) = (a.as_f64(), b.as_f64()) {
                    serde_json::Number::from_f64(af + bf)
                        .map(Value::Number)
                        .ok_or_else(|| StateError::Reducer("non-finite sum".to_string()))
                } else {
                    Err(StateError::Reducer("cannot add these numbers".to_string()))
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                let mut merged = a.clone();
                merged.extend_from_slice(b);
                Ok(Value::Array(merged))
            }
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => Err(StateError::Reducer(format!(
                "sum_concat cannot merge {} with {}",
                kind(current),
                kind(incoming)
            ))),
        }
    }

    fn name(&self) -> &str {
        "sum_concat"
    }
}

/// Treat both operands as sequences (wrapping scalars) and concatenate
#[derive(Debug, Clone, Copy)]
pub struct AppendReducer;

fn as_sequence(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, incoming: &Value) -> Result<Value, StateError> {
        let mut merged = as_sequence(current);
        merged.extend(as_sequence(incoming));
        Ok(Value::Array(merged))
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Shallow merge of key-value mappings; incoming wins on collisions
#[derive(Debug, Clone, Copy)]
pub struct MergeReducer;

impl Reducer for MergeReducer {
    fn reduce(&self, current: &Value, incoming: &Value) -> Result<Value, StateError> {
        match (current, incoming) {
            (Value::Null, Value::Object(_)) => Ok(incoming.clone()),
            (Value::Object(a), Value::Object(b)) => {
                let mut merged = a.clone();
                for (key, value) in b {
                    merged.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(merged))
            }
            _ => Err(StateError::Reducer(format!(
                "merge requires objects, got {} and {}",
                kind(current),
                kind(incoming)
            ))),
        }
    }

    fn name(&self) -> &str {
        "merge"
    }
}

/// Discard the current value, keep the incoming one
#[derive(Debug, Clone, Copy)]
pub struct ReplaceReducer;

impl Reducer for ReplaceReducer {
    fn reduce(&self, _current: &Value, incoming: &Value) -> Result<Value, StateError> {
        Ok(incoming.clone())
    }

    fn name(&self) -> &str {
        "replace"
    }
}

/// Ordered sequence merge keyed by each item's `id` field
///
/// Incoming items whose `id` matches an existing item's replace it in
/// place; items with no id, or an id not seen before, append in incoming
/// order. A `null` current value is treated as an empty sequence.
#[derive(Debug, Clone, Copy)]
pub struct MessageMergeReducer;

impl Reducer for MessageMergeReducer {
    fn reduce(&self, current: &Value, incoming: &Value) -> Result<Value, StateError> {
        let mut merged = as_sequence(current);
        for item in as_sequence(incoming) {
            let incoming_id = item.get("id").filter(|id| !id.is_null());
            let existing = incoming_id.and_then(|id| {
                merged
                    .iter()
                    .position(|m| m.get("id").filter(|mid| !mid.is_null()) == Some(id))
            });
            match existing {
                Some(index) => merged[index] = item,
                None => merged.push(item),
            }
        }
        Ok(Value::Array(merged))
    }

    fn name(&self) -> &str {
        "message_merge"
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sum_concat_adds_integers() {
        let merged = SumConcatReducer.reduce(&json!(5), &json!(3)).unwrap();
        assert_eq!(merged, json!(8));
    }

    #[test]
    fn sum_concat_adds_floats() {
        let merged = SumConcatReducer.reduce(&json!(2.5), &json!(0.5)).unwrap();
        assert_eq!(merged, json!(3.0));
    }

    #[test]
    fn sum_concat_concatenates_arrays_and_strings() {
        assert_eq!(
            SumConcatReducer.reduce(&json!([1]), &json!([2, 3])).unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(
            SumConcatReducer.reduce(&json!("ab"), &json!("c")).unwrap(),
            json!("abc")
        );
    }

    #[test]
    fn sum_concat_null_current_adopts_incoming() {
        assert_eq!(
            SumConcatReducer.reduce(&Value::Null, &json!([1])).unwrap(),
            json!([1])
        );
    }

    #[test]
    fn sum_concat_rejects_mismatched_kinds() {
        assert!(SumConcatReducer.reduce(&json!(1), &json!("x")).is_err());
    }

    #[test]
    fn append_wraps_scalars() {
        assert_eq!(
            AppendReducer.reduce(&json!(1), &json!([2, 3])).unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(
            AppendReducer.reduce(&Value::Null, &json!("x")).unwrap(),
            json!(["x"])
        );
    }

    #[test]
    fn merge_is_shallow_and_right_biased() {
        let merged = MergeReducer
            .reduce(&json!({"a": 1, "b": 2}), &json!({"b": 3, "c": 4}))
            .unwrap();
        assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_rejects_non_objects() {
        assert!(MergeReducer.reduce(&json!(1), &json!({"a": 1})).is_err());
    }

    #[test]
    fn replace_discards_current() {
        let merged = ReplaceReducer
            .reduce(&json!({"old": true}), &json!("new"))
            .unwrap();
        assert_eq!(merged, json!("new"));
    }

    #[test]
    fn message_merge_replaces_by_id_and_appends_the_rest() {
        let current = json!([
            {"id": "1", "content": "hello"},
            {"id": "2", "content": "world"},
        ]);
        let incoming = json!([
            {"id": "2", "content": "there"},
            {"id": "3", "content": "new"},
            {"content": "no id"},
        ]);

        let merged = MessageMergeReducer.reduce(&current, &incoming).unwrap();
        assert_eq!(
            merged,
            json!([
                {"id": "1", "content": "hello"},
                {"id": "2", "content": "there"},
                {"id": "3", "content": "new"},
                {"content": "no id"},
            ])
        );
    }

    #[test]
    fn message_merge_treats_null_current_as_empty() {
        let incoming = json!([{"id": "1"}]);
        let merged = MessageMergeReducer.reduce(&Value::Null, &incoming).unwrap();
        assert_eq!(merged, json!([{"id": "1"}]));
    }

    #[test]
    fn message_merge_leaves_operands_unmodified() {
        let current = json!([{"id": "1", "content": "a"}]);
        let incoming = json!([{"id": "1", "content": "b"}]);
        let current_before = current.clone();
        let incoming_before = incoming.clone();

        MessageMergeReducer.reduce(&current, &incoming).unwrap();
        assert_eq!(current, current_before);
        assert_eq!(incoming, incoming_before);
    }

    #[test]
    fn reducer_names() {
        assert_eq!(SumConcatReducer.name(), "sum_concat");
        assert_eq!(AppendReducer.name(), "append");
        assert_eq!(MergeReducer.name(), "merge");
        assert_eq!(ReplaceReducer.name(), "replace");
        assert_eq!(MessageMergeReducer.name(), "message_merge");
    }
}
