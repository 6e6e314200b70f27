//! Streaming of per-step execution events
//!
//! `Engine::stream` returns a lazy stream of [`StreamEvent`]s, filtered by
//! the requested [`StreamMode`]s. Within one superstep the order is fixed:
//! one `Updates` event, then one `Values` event; a final `Values` event
//! fires at exit. `Debug` mode carries the same information as raw event
//! objects (`{type, step, state?, updates?}`).
//!
//! The stream is driven by consumption: the run loop suspends when the
//! consumer stops pulling events.

use serde_json::{json, Value};
use std::collections::HashMap;

/// Which event families a stream subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Full state after each superstep (and once at exit)
    Values,

    /// Per-node update map, once per superstep
    Updates,

    /// Raw event objects for tracing and tooling
    Debug,
}

/// One streamed execution event
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// State after a superstep's merge (`step` counts from 0)
    Values { step: i64, state: Value },

    /// What each executed node contributed this superstep
    Updates {
        step: i64,
        updates: HashMap<String, Value>,
    },

    /// Raw event object: `{type, step, state?, updates?}`
    Debug(Value),
}

impl StreamEvent {
    /// The mode this event belongs to.
    pub fn mode(&self) -> StreamMode {
        match self {
            StreamEvent::Values { .. } => StreamMode::Values,
            StreamEvent::Updates { .. } => StreamMode::Updates,
            StreamEvent::Debug(_) => StreamMode::Debug,
        }
    }

    /// Debug rendering of a values event.
    pub fn debug_values(step: i64, state: &Value) -> Self {
        StreamEvent::Debug(json!({
            "type": "values",
            "step": step,
            "state": state,
        }))
    }

    /// Debug rendering of an updates event.
    pub fn debug_updates(step: i64, updates: &HashMap<String, Value>) -> Self {
        StreamEvent::Debug(json!({
            "type": "updates",
            "step": step,
            "updates": updates,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_report_their_mode() {
        let values = StreamEvent::Values {
            step: 0,
            state: json!({}),
        };
        assert_eq!(values.mode(), StreamMode::Values);

        let updates = StreamEvent::Updates {
            step: 0,
            updates: HashMap::new(),
        };
        assert_eq!(updates.mode(), StreamMode::Updates);

        assert_eq!(StreamEvent::debug_values(0, &json!({})).mode(), StreamMode::Debug);
    }

    #[test]
    fn debug_events_carry_type_and_step() {
        let mut updates = HashMap::new();
        updates.insert("a".to_string(), json!({"x": 1}));

        if let StreamEvent::Debug(payload) = StreamEvent::debug_updates(3, &updates) {
            assert_eq!(payload["type"], json!("updates"));
            assert_eq!(payload["step"], json!(3));
            assert_eq!(payload["updates"]["a"]["x"], json!(1));
        } else {
            panic!("expected debug event");
        }
    }
}
