//! Checkpoint data model for state persistence and resumption
//!
//! A checkpoint is a complete snapshot of a workflow's channel values taken
//! between supersteps, together with the bookkeeping the engine needs to
//! resume: per-channel versions, the versions each node has seen, and the
//! frontier that would run next.
//!
//! # Structure
//!
//! ```text
//! CheckpointTuple
//! ├── config          RunConfig     (thread_id, checkpoint_ns, checkpoint_id)
//! ├── checkpoint      Checkpoint    (id, ts, channel_values, versions, next_nodes)
//! ├── metadata        CheckpointMetadata (source, step, parents, extra)
//! ├── parent_config   Option<RunConfig>
//! └── pending_writes  Vec<PendingWrite>  ((task_id, channel, value) triples)
//! ```
//!
//! Checkpoints for one `(thread_id, checkpoint_ns)` pair form an append-only
//! log. The engine saves one checkpoint per lifecycle event, tagged with a
//! [`CheckpointSource`]:
//!
//! | Source | When |
//! |--------|------|
//! | `Input` | after initial state is built |
//! | `Loop` | after each superstep |
//! | `Interrupt` | when an interrupt fires before or after a node |
//! | `Update` | after a manual `update_state` |
//! | `Exit` | after the graph terminates |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint identifier (a UUID string unless the caller supplies one)
pub type CheckpointId = String;

/// A write produced by a task but not yet folded into a checkpoint:
/// `(task_id, channel_name, value)`.
pub type PendingWrite = (String, String, serde_json::Value);

/// Version counter for a single channel
///
/// Versions are bumped every time a channel receives a write in a superstep.
/// Integer versions are the norm; string versions are accepted from external
/// stores and must be managed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChannelVersion {
    Int(i64),
    String(String),
}

impl ChannelVersion {
    /// The next version in sequence. Errors for string versions, which have
    /// no intrinsic ordering.
    pub fn next(&self) -> crate::error::Result<Self> {
        match self {
            ChannelVersion::Int(v) => Ok(ChannelVersion::Int(v + 1)),
            ChannelVersion::String(s) => Err(crate::error::CheckpointError::InvalidConfig(
                format!("string channel version '{s}' must be managed explicitly"),
            )),
        }
    }
}

impl Default for ChannelVersion {
    fn default() -> Self {
        ChannelVersion::Int(0)
    }
}

/// Mapping from channel name to version
pub type ChannelVersions = HashMap<String, ChannelVersion>;

/// What caused a checkpoint to be written
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Saved after the initial state was built from input
    Input,
    /// Saved after a superstep inside the run loop
    Loop,
    /// Saved when an interrupt fired, just before the pause surfaced
    Interrupt,
    /// Saved by a manual state update
    Update,
    /// Saved when the graph terminated
    Exit,
}

/// Metadata stored alongside a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointMetadata {
    /// What caused this checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// Superstep counter at save time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,

    /// Parent checkpoint ids keyed by checkpoint namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<HashMap<String, String>>,

    /// Free-form extra metadata (e.g. `writes` attribution from
    /// `update_state`, interrupt payloads)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_parents(mut self, parents: HashMap<String, String>) -> Self {
        self.parents = Some(parents);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A point-in-time snapshot of all channel values plus version bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub v: i32,

    /// Unique id of this checkpoint
    pub id: CheckpointId,

    /// When the checkpoint was taken
    pub ts: DateTime<Utc>,

    /// Channel name to value at save time
    pub channel_values: HashMap<String, serde_json::Value>,

    /// Channel name to version at save time
    pub channel_versions: ChannelVersions,

    /// Node name to the channel versions that node had observed when it last
    /// ran; used to decide which nodes still need to execute
    pub versions_seen: HashMap<String, ChannelVersions>,

    /// The frontier that would execute next if the run resumed from here
    #[serde(default)]
    pub next_nodes: Vec<String>,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const FORMAT_VERSION: i32 = 1;

    pub fn new(
        id: CheckpointId,
        channel_values: HashMap<String, serde_json::Value>,
        channel_versions: ChannelVersions,
        versions_seen: HashMap<String, ChannelVersions>,
        next_nodes: Vec<String>,
    ) -> Self {
        Self {
            v: Self::FORMAT_VERSION,
            id,
            ts: Utc::now(),
            channel_values,
            channel_versions,
            versions_seen,
            next_nodes,
        }
    }

    /// An empty checkpoint with a fresh id
    pub fn empty() -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            Vec::new(),
        )
    }
}

/// Caller-supplied configuration identifying a thread and optionally a
/// specific checkpoint within it
///
/// This is the Rust rendering of the `{configurable: {thread_id,
/// checkpoint_ns, checkpoint_id}}` config shape: flattened, with
/// `checkpoint_ns` defaulting to the empty string.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// Thread (state lineage) identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Checkpoint namespace within the thread; empty string by default
    #[serde(default)]
    pub checkpoint_ns: String,

    /// A specific checkpoint to address; when absent, operations act on the
    /// newest checkpoint of the `(thread_id, checkpoint_ns)` pair
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,

    /// Extra per-run configuration (e.g. a `recursion_limit` override)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_checkpoint_ns(mut self, ns: impl Into<String>) -> Self {
        self.checkpoint_ns = ns.into();
        self
    }

    pub fn with_checkpoint_id(mut self, id: impl Into<CheckpointId>) -> Self {
        self.checkpoint_id = Some(id.into());
        self
    }

    /// Store a per-run recursion limit override in the extra map
    pub fn with_recursion_limit(mut self, limit: u64) -> Self {
        self.extra
            .insert("recursion_limit".to_string(), serde_json::json!(limit));
        self
    }

    /// Read back a recursion limit override, if one was set
    pub fn recursion_limit(&self) -> Option<usize> {
        self.extra
            .get("recursion_limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }
}

/// A checkpoint together with everything needed to act on it
#[derive(Debug, Clone)]
pub struct CheckpointTuple {
    /// Config addressing this exact checkpoint (checkpoint_id filled in)
    pub config: RunConfig,

    /// The snapshot itself
    pub checkpoint: Checkpoint,

    /// Save-time metadata
    pub metadata: CheckpointMetadata,

    /// Config of the checkpoint this one descends from, if any
    pub parent_config: Option<RunConfig>,

    /// Writes recorded against this checkpoint that have not been folded
    /// into a successor yet
    pub pending_writes: Vec<PendingWrite>,
}

impl CheckpointTuple {
    pub fn new(config: RunConfig, checkpoint: Checkpoint, metadata: CheckpointMetadata) -> Self {
        Self {
            config,
            checkpoint,
            metadata,
            parent_config: None,
            pending_writes: Vec::new(),
        }
    }

    pub fn with_parent_config(mut self, parent: RunConfig) -> Self {
        self.parent_config = Some(parent);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_checkpoint_has_fresh_id() {
        let a = Checkpoint::empty();
        let b = Checkpoint::empty();
        assert_eq!(a.v, Checkpoint::FORMAT_VERSION);
        assert_ne!(a.id, b.id);
        assert!(a.channel_values.is_empty());
        assert!(a.next_nodes.is_empty());
    }

    #[test]
    fn channel_version_increments() {
        let v = ChannelVersion::Int(3);
        assert_eq!(v.next().unwrap(), ChannelVersion::Int(4));

        let s = ChannelVersion::String("v2".into());
        assert!(s.next().is_err());
    }

    #[test]
    fn metadata_builder_roundtrip() {
        let meta = CheckpointMetadata::new()
            .with_source(CheckpointSource::Input)
            .with_step(0)
            .with_extra("note", serde_json::json!("initial"));

        assert_eq!(meta.source, Some(CheckpointSource::Input));
        assert_eq!(meta.step, Some(0));
        assert_eq!(meta.extra.get("note"), Some(&serde_json::json!("initial")));
    }

    #[test]
    fn run_config_defaults() {
        let config = RunConfig::new().with_thread_id("t-1");
        assert_eq!(config.thread_id.as_deref(), Some("t-1"));
        assert_eq!(config.checkpoint_ns, "");
        assert!(config.checkpoint_id.is_none());
        assert!(config.recursion_limit().is_none());
    }

    #[test]
    fn run_config_recursion_limit_override() {
        let config = RunConfig::new().with_recursion_limit(7);
        assert_eq!(config.recursion_limit(), Some(7));
    }

    #[test]
    fn checkpoint_serde_roundtrip() {
        let mut values = HashMap::new();
        values.insert("items".to_string(), serde_json::json!([1, 2]));
        let mut versions = HashMap::new();
        versions.insert("items".to_string(), ChannelVersion::Int(2));

        let cp = Checkpoint::new(
            "cp-1".to_string(),
            values,
            versions,
            HashMap::new(),
            vec!["worker".to_string()],
        );

        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "cp-1");
        assert_eq!(back.next_nodes, vec!["worker".to_string()]);
        assert_eq!(back.channel_values["items"], serde_json::json!([1, 2]));
    }
}
