//! In-memory checkpoint saver
//!
//! [`InMemorySaver`] is the reference implementation of the
//! [`CheckpointSaver`] contract, backed by a `tokio::sync::RwLock`-guarded
//! map of append-only logs, one per `(thread_id, checkpoint_ns)` pair. It
//! covers development and tests; nothing survives a restart.
//!
//! The log position — not the checkpoint id — is the ordering the saver
//! works from: `list` walks each log back-to-front, and a `before` cursor
//! admits exactly the entries appended earlier than the checkpoint it names.
//! This keeps "newest first" deterministic even though checkpoint ids are
//! random UUIDs.

use crate::checkpoint::{
    ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointTuple, PendingWrite, RunConfig,
};
use crate::error::{CheckpointError, Result};
use crate::traits::{CheckpointSaver, CheckpointStream};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One stored checkpoint with everything attached to it
#[derive(Debug, Clone)]
struct LogEntry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    config: RunConfig,
    parent_config: Option<RunConfig>,
    writes: Vec<PendingWrite>,
}

impl LogEntry {
    fn to_tuple(&self) -> CheckpointTuple {
        CheckpointTuple {
            config: self.config.clone(),
            checkpoint: self.checkpoint.clone(),
            metadata: self.metadata.clone(),
            parent_config: self.parent_config.clone(),
            pending_writes: self.writes.clone(),
        }
    }
}

type Logs = HashMap<(String, String), Vec<LogEntry>>;

/// Thread-safe in-memory checkpoint storage
#[derive(Debug, Clone, Default)]
pub struct InMemorySaver {
    logs: Arc<RwLock<Logs>>,
}

impl InMemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `(thread, namespace)` logs currently held.
    pub async fn thread_count(&self) -> usize {
        self.logs.read().await.len()
    }

    /// Total number of checkpoints across all logs.
    pub async fn checkpoint_count(&self) -> usize {
        self.logs
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Drop everything. Test isolation helper.
    pub async fn clear(&self) {
        self.logs.write().await.clear();
    }

    fn require_thread_id(config: &RunConfig) -> Result<&str> {
        config
            .thread_id
            .as_deref()
            .ok_or_else(|| CheckpointError::InvalidConfig("thread_id is required".to_string()))
    }
}

#[async_trait]
impl CheckpointSaver for InMemorySaver {
    async fn get_tuple(&self, config: &RunConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = Self::require_thread_id(config)?;
        let logs = self.logs.read().await;
        let entries = match logs.get(&(thread_id.to_string(), config.checkpoint_ns.clone())) {
            Some(entries) => entries,
            None => return Ok(None),
        };

        let entry = match &config.checkpoint_id {
            Some(id) => entries.iter().find(|e| &e.checkpoint.id == id),
            None => entries.last(),
        };
        Ok(entry.map(LogEntry::to_tuple))
    }

    async fn list(
        &self,
        config: Option<&RunConfig>,
        filter: Option<HashMap<String, serde_json::Value>>,
        before: Option<&RunConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let logs = self.logs.read().await;

        // Scope to one thread (and optionally one namespace) when configured.
        let mut keys: Vec<(String, String)> = match config.and_then(|c| c.thread_id.clone()) {
            Some(thread_id) => logs
                .keys()
                .filter(|(t, ns)| {
                    *t == thread_id
                        && config.map(|c| c.checkpoint_ns == *ns).unwrap_or(true)
                })
                .cloned()
                .collect(),
            None => logs.keys().cloned().collect(),
        };
        keys.sort();

        let mut results: Vec<Result<CheckpointTuple>> = Vec::new();
        'outer: for key in keys {
            let entries = &logs[&key];

            // The `before` cursor is a log position: entries appended at or
            // after the named checkpoint are excluded.
            let cutoff = before
                .and_then(|b| b.checkpoint_id.as_ref())
                .and_then(|id| entries.iter().position(|e| &e.checkpoint.id == id))
                .unwrap_or(entries.len());

            for entry in entries[..cutoff].iter().rev() {
                if let Some(filter_map) = &filter {
                    let meta = serde_json::to_value(&entry.metadata)?;
                    let matches = filter_map
                        .iter()
                        .all(|(k, v)| meta.get(k) == Some(v));
                    if !matches {
                        continue;
                    }
                }

                results.push(Ok(entry.to_tuple()));
                if limit.map(|l| results.len() >= l).unwrap_or(false) {
                    break 'outer;
                }
            }
        }

        Ok(Box::pin(stream::iter(results)))
    }

    async fn put(
        &self,
        config: &RunConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        _new_versions: ChannelVersions,
    ) -> Result<RunConfig> {
        let thread_id = Self::require_thread_id(config)?.to_string();
        let mut logs = self.logs.write().await;
        let entries = logs
            .entry((thread_id.clone(), config.checkpoint_ns.clone()))
            .or_default();

        let stored_config = RunConfig {
            thread_id: Some(thread_id),
            checkpoint_ns: config.checkpoint_ns.clone(),
            checkpoint_id: Some(checkpoint.id.clone()),
            extra: config.extra.clone(),
        };

        // The config used to save records the parent lineage.
        let parent_config = config.checkpoint_id.as_ref().map(|_| config.clone());

        entries.push(LogEntry {
            checkpoint,
            metadata,
            config: stored_config.clone(),
            parent_config,
            writes: Vec::new(),
        });

        Ok(stored_config)
    }

    async fn put_writes(
        &self,
        config: &RunConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()> {
        let thread_id = Self::require_thread_id(config)?.to_string();
        let checkpoint_id = config.checkpoint_id.as_ref().ok_or_else(|| {
            CheckpointError::InvalidConfig("checkpoint_id is required".to_string())
        })?;

        let mut logs = self.logs.write().await;
        let entries = logs
            .get_mut(&(thread_id, config.checkpoint_ns.clone()))
            .ok_or_else(|| CheckpointError::NotFound(checkpoint_id.clone()))?;

        let entry = entries
            .iter_mut()
            .find(|e| &e.checkpoint.id == checkpoint_id)
            .ok_or_else(|| CheckpointError::NotFound(checkpoint_id.clone()))?;

        for (channel, value) in writes {
            entry.writes.push((task_id.clone(), channel, value));
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut logs = self.logs.write().await;
        logs.retain(|(t, _), _| t != thread_id);
        Ok(())
    }
}
