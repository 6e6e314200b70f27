//! Read-only state snapshots returned by `get_state`

use crate::interrupt::Interrupt;
use chrono::{DateTime, Utc};
use serde_json::Value;
use weft_checkpoint::{CheckpointMetadata, CheckpointTuple, PendingWrite, RunConfig};

/// A read-only view of a thread's state at one checkpoint
///
/// Snapshots never alias live engine state; mutating one has no effect on
/// any run.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Channel values at the checkpoint
    pub values: Value,

    /// The frontier that would execute next on resume
    pub next_nodes: Vec<String>,

    /// Config addressing the underlying checkpoint
    pub config: RunConfig,

    /// Save-time metadata
    pub metadata: CheckpointMetadata,

    /// When the checkpoint was taken
    pub created_at: Option<DateTime<Utc>>,

    /// Config of the parent checkpoint, if any
    pub parent_config: Option<RunConfig>,

    /// Pending task writes recorded against the checkpoint
    pub tasks: Vec<PendingWrite>,

    /// Interrupts that were live when the checkpoint was saved
    pub interrupts: Vec<Interrupt>,
}

impl From<CheckpointTuple> for StateSnapshot {
    fn from(tuple: CheckpointTuple) -> Self {
        let interrupts = tuple
            .metadata
            .extra
            .get("interrupts")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let values = Value::Object(tuple.checkpoint.channel_values.into_iter().collect());

        Self {
            values,
            next_nodes: tuple.checkpoint.next_nodes,
            config: tuple.config,
            metadata: tuple.metadata,
            created_at: Some(tuple.checkpoint.ts),
            parent_config: tuple.parent_config,
            tasks: tuple.pending_writes,
            interrupts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use weft_checkpoint::{Checkpoint, CheckpointMetadata};

    #[test]
    fn snapshot_from_tuple_carries_everything() {
        let mut values = HashMap::new();
        values.insert("value".to_string(), json!("a"));
        let checkpoint = Checkpoint::new(
            "cp".to_string(),
            values,
            HashMap::new(),
            HashMap::new(),
            vec!["b".to_string()],
        );
        let interrupt = Interrupt::with_id(json!("Interrupted before 'b'"), "abc");
        let metadata = CheckpointMetadata::new()
            .with_extra("interrupts", serde_json::to_value(vec![&interrupt]).unwrap());
        let tuple = CheckpointTuple::new(
            RunConfig::new().with_thread_id("t"),
            checkpoint,
            metadata,
        );

        let snapshot = StateSnapshot::from(tuple);
        assert_eq!(snapshot.values["value"], json!("a"));
        assert_eq!(snapshot.next_nodes, vec!["b".to_string()]);
        assert!(snapshot.created_at.is_some());
        assert_eq!(snapshot.interrupts, vec![interrupt]);
        assert!(snapshot.tasks.is_empty());
    }
}
