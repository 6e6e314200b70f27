//! Error taxonomy for graph construction and execution
//!
//! All failures surface as [`GraphError`]. The variants map one-to-one onto
//! the ways a run can go wrong:
//!
//! ```text
//! GraphError
//! ├── Recursion      - superstep budget exhausted
//! ├── InvalidUpdate  - a single-slot field written twice in one step
//! ├── EmptyChannel   - read of a channel holding no value
//! ├── InvalidGraph   - structural validation or unknown conditional label
//! ├── NodeExecution  - a node body failed (retries exhausted)
//! ├── Interrupt      - orderly pause, state already checkpointed
//! ├── EmptyInput     - invocation with nothing to run on
//! ├── TaskNotFound   - checkpoint refers to an unknown task
//! ├── Checkpoint     - persistence failure
//! ├── Serialization  - JSON conversion failure
//! └── State          - schema/reducer failure
//! ```
//!
//! Propagation rules: node-body errors are retried when the node's policy
//! matches, then wrapped in `NodeExecution`; `Interrupt` and `Recursion`
//! raised inside a node body escape unwrapped; reducer errors and
//! `InvalidUpdate` abort the step before any merge lands; builder validation
//! raises synchronously from `compile`.

use crate::interrupt::Interrupt;
use crate::reducers::StateError;
use thiserror::Error;
use weft_checkpoint::CheckpointError;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Boxed error type returned by node bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// All failures raised by the builder and the engine
#[derive(Debug, Error)]
pub enum GraphError {
    /// The superstep counter reached the recursion limit before the frontier
    /// drained. Raised before the offending step executes.
    #[error("Recursion limit of {limit} reached without hitting a stop condition. You can adjust the limit or the graph routing.")]
    Recursion { limit: usize },

    /// A last-value field received more than one write in a single
    /// superstep. The message names the field.
    #[error("{0}")]
    InvalidUpdate(String),

    /// Read of a channel that holds no value
    #[error("Channel '{0}' is empty")]
    EmptyChannel(String),

    /// Structural validation failed at compile time, or a conditional edge
    /// produced a label the graph cannot resolve at run time
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// A node body failed after its retry policy (if any) was exhausted
    #[error("Node '{node}' execution failed: {source}")]
    NodeExecution {
        /// Name of the failing node
        node: String,
        /// The original error raised by the node body
        #[source]
        source: BoxError,
    },

    /// Orderly pause; the state was checkpointed before this surfaced.
    /// Resume by invoking with null input and the same thread config.
    #[error("Graph execution interrupted ({} interrupt{})", .0.len(), if .0.len() == 1 { "" } else { "s" })]
    Interrupt(Vec<Interrupt>),

    /// Invocation with required input missing
    #[error("Received no input to run on")]
    EmptyInput,

    /// A checkpoint referenced a task the engine does not know
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Persistence failure from the checkpoint saver
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// JSON conversion failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Schema or reducer failure, surfaced with the offending field
    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl GraphError {
    /// The canonical multi-write error for last-value fields.
    pub fn single_value_violation(key: &str) -> Self {
        GraphError::InvalidUpdate(format!(
            "At key '{key}': Can receive only one value per step."
        ))
    }

    /// Wrap a node-body error with its node name.
    pub fn node_execution(node: impl Into<String>, source: BoxError) -> Self {
        GraphError::NodeExecution {
            node: node.into(),
            source,
        }
    }

    /// An interrupt carrying a single payload.
    pub fn interrupted(interrupt: Interrupt) -> Self {
        GraphError::Interrupt(vec![interrupt])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursion_message_names_the_limit() {
        let err = GraphError::Recursion { limit: 3 };
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn invalid_update_names_the_key() {
        let err = GraphError::single_value_violation("value");
        assert_eq!(
            err.to_string(),
            "At key 'value': Can receive only one value per step."
        );
    }

    #[test]
    fn node_execution_carries_the_original() {
        let err = GraphError::node_execution("worker", "boom".into());
        assert!(err.to_string().contains("worker"));
        assert!(err.to_string().contains("boom"));
        match err {
            GraphError::NodeExecution { node, source } => {
                assert_eq!(node, "worker");
                assert_eq!(source.to_string(), "boom");
            }
            _ => panic!("expected NodeExecution"),
        }
    }
}
