//! Channel storage disciplines
//!
//! A channel is the storage discipline for one state field: how a batch of
//! writes arriving in one superstep folds into the stored value, and how
//! that value round-trips through a checkpoint. Four disciplines are
//! provided:
//!
//! - [`LastValueChannel`] — a single slot that accepts at most one write per
//!   step
//! - [`OperatorAggregateChannel`] — folds writes through a binary operator,
//!   accumulating across supersteps
//! - [`EphemeralChannel`] — last-value semantics, but the slot empties again
//!   on a step with no fresh writes
//! - [`TopicChannel`] — collects many values, optionally accumulating across
//!   steps
//!
//! `update` receives the full batch of writes for one superstep and reports
//! whether the channel changed. Checkpoints use the [`MISSING`] sentinel to
//! encode the empty state; `from_checkpoint` restores a channel to equality
//! with the one that was checkpointed, flags included.

use crate::error::{CheckpointError, Result};
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::Arc;

/// Sentinel encoding "no value" inside channel checkpoints.
pub const MISSING: &str = "__missing__";

fn missing() -> Value {
    Value::String(MISSING.to_string())
}

fn is_missing(value: &Value) -> bool {
    value.as_str() == Some(MISSING)
}

/// Storage discipline for one state field
pub trait Channel: Send + Sync + Debug {
    /// The state field this channel backs; used in error messages.
    fn key(&self) -> &str;

    /// Current value of the channel.
    ///
    /// # Errors
    ///
    /// `EmptyChannel` if the channel holds no value.
    fn get(&self) -> Result<Value>;

    /// Fold one superstep's batch of writes into the channel. Returns
    /// whether the channel changed.
    ///
    /// # Errors
    ///
    /// `InvalidUpdate` if the batch violates the channel's discipline.
    fn update(&mut self, values: Vec<Value>) -> Result<bool>;

    /// Whether the channel currently holds a value.
    fn is_available(&self) -> bool;

    /// Serializable snapshot of the channel state, with [`MISSING`]
    /// standing in for the empty state.
    fn checkpoint(&self) -> Value;

    /// Restore this channel from a snapshot produced by [`checkpoint`](Channel::checkpoint).
    fn from_checkpoint(&mut self, checkpoint: Value) -> Result<()>;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Channel>;
}

impl Clone for Box<dyn Channel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Single-slot channel: at most one write per superstep
#[derive(Debug, Clone)]
pub struct LastValueChannel {
    key: String,
    value: Option<Value>,
}

impl LastValueChannel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }
}

impl Channel for LastValueChannel {
    fn key(&self) -> &str {
        &self.key
    }

    fn get(&self) -> Result<Value> {
        self.value
            .clone()
            .ok_or_else(|| CheckpointError::EmptyChannel(self.key.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        match values.len() {
            0 => Ok(false),
            1 => {
                self.value = values.into_iter().next();
                Ok(true)
            }
            _ => Err(CheckpointError::single_value_violation(&self.key)),
        }
    }

    fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn checkpoint(&self) -> Value {
        self.value.clone().unwrap_or_else(missing)
    }

    fn from_checkpoint(&mut self, checkpoint: Value) -> Result<()> {
        self.value = if is_missing(&checkpoint) {
            None
        } else {
            Some(checkpoint)
        };
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Binary fold function used by [`OperatorAggregateChannel`]
pub type BinaryOperator = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Channel that folds every write through a binary operator
///
/// The first write seeds the accumulator, unless a default was supplied, in
/// which case the first write folds into the default. The accumulator
/// persists across supersteps.
#[derive(Clone)]
pub struct OperatorAggregateChannel {
    key: String,
    operator: BinaryOperator,
    default: Option<Value>,
    value: Option<Value>,
}

impl OperatorAggregateChannel {
    pub fn new(key: impl Into<String>, operator: BinaryOperator) -> Self {
        Self {
            key: key.into(),
            operator,
            default: None,
            value: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.value = Some(default.clone());
        self.default = Some(default);
        self
    }
}

impl Debug for OperatorAggregateChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorAggregateChannel")
            .field("key", &self.key)
            .field("default", &self.default)
            .field("value", &self.value)
            .field("operator", &"<function>")
            .finish()
    }
}

impl Channel for OperatorAggregateChannel {
    fn key(&self) -> &str {
        &self.key
    }

    fn get(&self) -> Result<Value> {
        self.value
            .clone()
            .ok_or_else(|| CheckpointError::EmptyChannel(self.key.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        let mut acc = self.value.take();
        for incoming in values {
            acc = Some(match acc {
                Some(current) => (self.operator)(&current, &incoming),
                None => incoming,
            });
        }
        self.value = acc;
        Ok(true)
    }

    fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn checkpoint(&self) -> Value {
        self.value.clone().unwrap_or_else(missing)
    }

    fn from_checkpoint(&mut self, checkpoint: Value) -> Result<()> {
        self.value = if is_missing(&checkpoint) {
            None
        } else {
            Some(checkpoint)
        };
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Last-value channel that forgets its value on a quiet step
///
/// Under `guard` (the default) it rejects multiple writes per step exactly
/// like [`LastValueChannel`]. An empty update clears a populated slot; with
/// `guard` off, multiple writes per step are accepted and the last wins.
#[derive(Debug, Clone)]
pub struct EphemeralChannel {
    key: String,
    guard: bool,
    value: Option<Value>,
}

impl EphemeralChannel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            guard: true,
            value: None,
        }
    }

    pub fn with_guard(key: impl Into<String>, guard: bool) -> Self {
        Self {
            key: key.into(),
            guard,
            value: None,
        }
    }

    pub fn guard(&self) -> bool {
        self.guard
    }
}

impl Channel for EphemeralChannel {
    fn key(&self) -> &str {
        &self.key
    }

    fn get(&self) -> Result<Value> {
        self.value
            .clone()
            .ok_or_else(|| CheckpointError::EmptyChannel(self.key.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        if values.is_empty() {
            return Ok(if self.value.is_some() {
                self.value = None;
                true
            } else {
                false
            });
        }
        if self.guard && values.len() > 1 {
            return Err(CheckpointError::single_value_violation(&self.key));
        }
        self.value = values.into_iter().last();
        Ok(true)
    }

    fn is_available(&self) -> bool {
        self.value.is_some()
    }

    fn checkpoint(&self) -> Value {
        json!({
            "guard": self.guard,
            "value": self.value.clone().unwrap_or_else(missing),
        })
    }

    fn from_checkpoint(&mut self, checkpoint: Value) -> Result<()> {
        let obj = checkpoint.as_object().ok_or_else(|| {
            CheckpointError::InvalidCheckpoint(format!(
                "ephemeral checkpoint for '{}' must be an object",
                self.key
            ))
        })?;
        self.guard = obj.get("guard").and_then(Value::as_bool).unwrap_or(true);
        self.value = match obj.get("value") {
            Some(v) if !is_missing(v) => Some(v.clone()),
            _ => None,
        };
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

/// Channel collecting many values per step
///
/// One level of nested arrays is flattened on ingest. Without `accumulate`
/// the collection is cleared at the start of every update; with it, values
/// persist across updates. Reading an empty topic is an error.
#[derive(Debug, Clone)]
pub struct TopicChannel {
    key: String,
    accumulate: bool,
    values: Vec<Value>,
}

impl TopicChannel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            accumulate: false,
            values: Vec::new(),
        }
    }

    pub fn accumulating(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            accumulate: true,
            values: Vec::new(),
        }
    }

    pub fn accumulate(&self) -> bool {
        self.accumulate
    }

    /// All collected values, in arrival order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl Channel for TopicChannel {
    fn key(&self) -> &str {
        &self.key
    }

    fn get(&self) -> Result<Value> {
        if self.values.is_empty() {
            return Err(CheckpointError::EmptyChannel(self.key.clone()));
        }
        Ok(Value::Array(self.values.clone()))
    }

    fn update(&mut self, values: Vec<Value>) -> Result<bool> {
        let had_values = !self.values.is_empty();
        if !self.accumulate {
            self.values.clear();
        }
        let mut ingested = false;
        for value in values {
            ingested = true;
            match value {
                Value::Array(items) => self.values.extend(items),
                other => self.values.push(other),
            }
        }
        Ok(ingested || (!self.accumulate && had_values))
    }

    fn is_available(&self) -> bool {
        !self.values.is_empty()
    }

    fn checkpoint(&self) -> Value {
        json!({
            "accumulate": self.accumulate,
            "values": self.values.clone(),
        })
    }

    fn from_checkpoint(&mut self, checkpoint: Value) -> Result<()> {
        let obj = checkpoint.as_object().ok_or_else(|| {
            CheckpointError::InvalidCheckpoint(format!(
                "topic checkpoint for '{}' must be an object",
                self.key
            ))
        })?;
        self.accumulate = obj
            .get("accumulate")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.values = match obj.get("values") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_stores_single_write() {
        let mut channel = LastValueChannel::new("field");
        assert!(!channel.is_available());
        assert!(!channel.update(vec![]).unwrap());

        assert!(channel.update(vec![json!(42)]).unwrap());
        assert_eq!(channel.get().unwrap(), json!(42));

        assert!(channel.update(vec![json!("next")]).unwrap());
        assert_eq!(channel.get().unwrap(), json!("next"));
    }

    #[test]
    fn last_value_rejects_multiple_writes() {
        let mut channel = LastValueChannel::new("count");
        let err = channel.update(vec![json!(1), json!(2)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "At key 'count': Can receive only one value per step."
        );
        assert!(!channel.is_available());
    }

    #[test]
    fn last_value_empty_get_is_error() {
        let channel = LastValueChannel::new("field");
        assert!(matches!(
            channel.get(),
            Err(CheckpointError::EmptyChannel(k)) if k == "field"
        ));
    }

    #[test]
    fn operator_aggregate_folds_batches() {
        let sum: BinaryOperator = Arc::new(|a, b| {
            json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0))
        });
        let mut channel = OperatorAggregateChannel::new("total", sum);

        assert!(!channel.update(vec![]).unwrap());
        assert!(channel.update(vec![json!(1), json!(2), json!(3)]).unwrap());
        assert_eq!(channel.get().unwrap(), json!(6));

        // accumulates across steps
        channel.update(vec![json!(4)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(10));
    }

    #[test]
    fn operator_aggregate_default_seeds_fold() {
        let sum: BinaryOperator = Arc::new(|a, b| {
            json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0))
        });
        let mut channel = OperatorAggregateChannel::new("total", sum).with_default(json!(100));
        channel.update(vec![json!(5)]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(105));
    }

    #[test]
    fn ephemeral_clears_on_empty_update() {
        let mut channel = EphemeralChannel::new("signal");
        assert!(!channel.update(vec![]).unwrap());

        channel.update(vec![json!("ping")]).unwrap();
        assert!(channel.is_available());

        // a quiet step clears the slot and reports the change
        assert!(channel.update(vec![]).unwrap());
        assert!(!channel.is_available());
        assert!(!channel.update(vec![]).unwrap());
    }

    #[test]
    fn ephemeral_guard_rejects_multiple_writes() {
        let mut channel = EphemeralChannel::new("signal");
        assert!(channel.update(vec![json!(1), json!(2)]).is_err());

        let mut unguarded = EphemeralChannel::with_guard("signal", false);
        assert!(unguarded.update(vec![json!(1), json!(2)]).unwrap());
        assert_eq!(unguarded.get().unwrap(), json!(2));
    }

    #[test]
    fn topic_flattens_one_level() {
        let mut channel = TopicChannel::new("events");
        channel
            .update(vec![json!([1, 2]), json!(3), json!([[4]])])
            .unwrap();
        assert_eq!(channel.get().unwrap(), json!([1, 2, 3, [4]]));
    }

    #[test]
    fn topic_clears_between_updates_without_accumulate() {
        let mut channel = TopicChannel::new("events");
        channel.update(vec![json!("a")]).unwrap();
        channel.update(vec![json!("b")]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(["b"]));

        // empty update clears, and reports true because it had values
        assert!(channel.update(vec![]).unwrap());
        assert!(!channel.is_available());
        assert!(!channel.update(vec![]).unwrap());
    }

    #[test]
    fn topic_accumulates_when_asked() {
        let mut channel = TopicChannel::accumulating("events");
        channel.update(vec![json!("a")]).unwrap();
        channel.update(vec![json!("b")]).unwrap();
        assert_eq!(channel.get().unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn topic_empty_get_is_error() {
        let channel = TopicChannel::new("events");
        assert!(matches!(
            channel.get(),
            Err(CheckpointError::EmptyChannel(_))
        ));
    }

    #[test]
    fn checkpoint_roundtrip_last_value() {
        let mut populated = LastValueChannel::new("field");
        populated.update(vec![json!({"a": 1})]).unwrap();

        let mut restored = LastValueChannel::new("field");
        restored.from_checkpoint(populated.checkpoint()).unwrap();
        assert_eq!(restored.get().unwrap(), json!({"a": 1}));

        let empty = LastValueChannel::new("field");
        let mut restored_empty = LastValueChannel::new("field");
        restored_empty.from_checkpoint(empty.checkpoint()).unwrap();
        assert!(!restored_empty.is_available());
    }

    #[test]
    fn checkpoint_roundtrip_operator_aggregate() {
        let sum: BinaryOperator = Arc::new(|a, b| {
            json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0))
        });
        let mut populated = OperatorAggregateChannel::new("total", sum.clone());
        populated.update(vec![json!(7)]).unwrap();

        let mut restored = OperatorAggregateChannel::new("total", sum.clone());
        restored.from_checkpoint(populated.checkpoint()).unwrap();
        assert_eq!(restored.get().unwrap(), json!(7));

        // restored channel keeps folding with its operator
        restored.update(vec![json!(3)]).unwrap();
        assert_eq!(restored.get().unwrap(), json!(10));

        let empty = OperatorAggregateChannel::new("total", sum.clone());
        let mut restored_empty = OperatorAggregateChannel::new("total", sum);
        restored_empty.from_checkpoint(empty.checkpoint()).unwrap();
        assert!(!restored_empty.is_available());
    }

    #[test]
    fn checkpoint_roundtrip_ephemeral_preserves_guard() {
        let mut populated = EphemeralChannel::with_guard("signal", false);
        populated.update(vec![json!("x"), json!("y")]).unwrap();

        let mut restored = EphemeralChannel::new("signal");
        restored.from_checkpoint(populated.checkpoint()).unwrap();
        assert_eq!(restored.get().unwrap(), json!("y"));
        assert!(!restored.guard());

        let empty = EphemeralChannel::new("signal");
        let mut restored_empty = EphemeralChannel::new("signal");
        restored_empty.from_checkpoint(empty.checkpoint()).unwrap();
        assert!(!restored_empty.is_available());
        assert!(restored_empty.guard());
    }

    #[test]
    fn checkpoint_roundtrip_topic_preserves_accumulate() {
        let mut populated = TopicChannel::accumulating("events");
        populated.update(vec![json!("a")]).unwrap();
        populated.update(vec![json!("b")]).unwrap();

        let mut restored = TopicChannel::new("events");
        restored.from_checkpoint(populated.checkpoint()).unwrap();
        assert_eq!(restored.get().unwrap(), json!(["a", "b"]));
        assert!(restored.accumulate());

        let empty = TopicChannel::new("events");
        let mut restored_empty = TopicChannel::accumulating("events");
        restored_empty.from_checkpoint(empty.checkpoint()).unwrap();
        assert!(!restored_empty.is_available());
        assert!(!restored_empty.accumulate());
    }
}
