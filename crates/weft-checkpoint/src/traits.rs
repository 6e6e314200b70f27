//! Checkpoint saver contract
//!
//! [`CheckpointSaver`] is the storage abstraction the engine persists through.
//! Implementations map the contract onto a backing store (the in-memory
//! reference implementation lives in [`crate::memory`]; database-backed
//! savers are external collaborators).
//!
//! The contract:
//!
//! - checkpoints for one `(thread_id, checkpoint_ns)` pair form an
//!   append-only log, saved in order;
//! - `get_tuple` addresses a checkpoint by id, or the newest one when the
//!   config carries no id;
//! - `list` streams newest-first, with optional metadata filtering, an
//!   exclusive `before` cursor, and a limit;
//! - `put_writes` attaches task writes to an already-saved checkpoint;
//! - `delete_thread` drops every namespace of a thread.

use crate::checkpoint::{
    ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointTuple, RunConfig,
};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::Stream;
use std::collections::HashMap;
use std::pin::Pin;

/// Async stream of checkpoint tuples, newest first
pub type CheckpointStream = Pin<Box<dyn Stream<Item = Result<CheckpointTuple>> + Send + 'static>>;

/// Storage backend contract for checkpoint persistence
///
/// Implementations must be `Send + Sync`; each `(thread_id, checkpoint_ns)`
/// pair owns an independent, append-ordered checkpoint history. Writes to
/// the same pair must be serialised by the implementation.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch just the checkpoint addressed by `config`, if it exists.
    async fn get(&self, config: &RunConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|tuple| tuple.checkpoint))
    }

    /// Fetch the full tuple addressed by `config`: the exact checkpoint when
    /// `checkpoint_id` is set, otherwise the newest one saved for the
    /// config's `(thread_id, checkpoint_ns)`.
    async fn get_tuple(&self, config: &RunConfig) -> Result<Option<CheckpointTuple>>;

    /// Stream checkpoints newest-first.
    ///
    /// `config` scopes the search to a thread (and namespace); `filter`
    /// entries must each match the tuple's metadata for it to be admitted;
    /// `before` is an exclusive upper bound — only checkpoints saved
    /// strictly earlier than the one it names are returned; `limit` caps the
    /// result count.
    async fn list(
        &self,
        config: Option<&RunConfig>,
        filter: Option<HashMap<String, serde_json::Value>>,
        before: Option<&RunConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Append a checkpoint to the log of `config`'s thread and namespace.
    /// Returns a config addressing the stored checkpoint.
    async fn put(
        &self,
        config: &RunConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<RunConfig>;

    /// Attach task writes to the checkpoint addressed by `config`. Each
    /// `(channel, value)` pair is recorded as a [`PendingWrite`] under
    /// `task_id`.
    async fn put_writes(
        &self,
        config: &RunConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()>;

    /// Delete every checkpoint (all namespaces) belonging to a thread.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}
