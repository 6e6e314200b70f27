//! Dynamic task dispatch and conditional-edge outcomes
//!
//! [`Send`] asks the engine to run one extra invocation of a target node
//! *within the current superstep*, with an argument applied as a state
//! overlay on a private copy of the state. Conditional edges and node
//! results can both emit Sends, which is how map-reduce fan-out works: a
//! router returns one Send per work item, every Send runs this step, and
//! their updates fold back into state through the field reducers.
//!
//! ```text
//!  fan_out ──┬── Send("worker", {task: 1}) ──▶ worker   ┐
//!            ├── Send("worker", {task: 2}) ──▶ worker   ├─ same superstep
//!            └── {results: ["start"]}                   ┘
//! ```
//!
//! [`BranchOutcome`] is what a conditional edge's path function returns: a
//! label (translated through the edge's path map), several labels, or Sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One extra invocation of `node` this superstep, with `arg` overlaid on a
/// private copy of the state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Send {
    node: String,
    arg: Value,
}

impl Send {
    pub fn new(node: impl Into<String>, arg: Value) -> Self {
        Self {
            node: node.into(),
            arg,
        }
    }

    /// Target node name.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// State overlay for the invocation.
    pub fn arg(&self) -> &Value {
        &self.arg
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.node, self.arg)
    }
}

/// What a conditional edge's path function resolved to
///
/// Labels go through the edge's path map (when one is set) before they name
/// nodes; Sends are dispatched as-is.
#[derive(Debug, Clone)]
pub enum BranchOutcome {
    /// A single label (or node name when no path map is set)
    Label(String),

    /// Several labels, each resolved independently
    Labels(Vec<String>),

    /// One dynamic dispatch
    Dispatch(Send),

    /// Several dynamic dispatches
    DispatchMany(Vec<Send>),
}

impl From<&str> for BranchOutcome {
    fn from(label: &str) -> Self {
        BranchOutcome::Label(label.to_string())
    }
}

impl From<String> for BranchOutcome {
    fn from(label: String) -> Self {
        BranchOutcome::Label(label)
    }
}

impl From<Vec<String>> for BranchOutcome {
    fn from(labels: Vec<String>) -> Self {
        BranchOutcome::Labels(labels)
    }
}

impl From<Vec<&str>> for BranchOutcome {
    fn from(labels: Vec<&str>) -> Self {
        BranchOutcome::Labels(labels.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Send> for BranchOutcome {
    fn from(send: Send) -> Self {
        BranchOutcome::Dispatch(send)
    }
}

impl From<Vec<Send>> for BranchOutcome {
    fn from(sends: Vec<Send>) -> Self {
        BranchOutcome::DispatchMany(sends)
    }
}
