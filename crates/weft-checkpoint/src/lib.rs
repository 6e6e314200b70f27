//! Channel storage disciplines and checkpoint persistence for the weft
//! workflow engine
//!
//! This crate owns the data model the engine persists between supersteps:
//!
//! - **Channels** ([`channels`]) — the four storage disciplines a state
//!   field can follow (last-value, operator-aggregate, ephemeral, topic),
//!   each with a checkpointable snapshot format.
//! - **Checkpoints** ([`checkpoint`]) — snapshots of all channel values with
//!   version bookkeeping, metadata, and the next frontier, addressed by
//!   `(thread_id, checkpoint_ns, checkpoint_id)`.
//! - **Saver contract** ([`traits`]) — the async storage abstraction
//!   ([`CheckpointSaver`]) that persistent backends implement.
//! - **In-memory saver** ([`memory`]) — the reference implementation used
//!   in development and tests.
//! - **Serializer** ([`serializer`]) — pluggable wire format for backends
//!   that persist bytes.
//!
//! ```text
//!  engine superstep ──put()──▶ ┌────────────────────────────┐
//!                              │ (thread_id, ns) log         │
//!  get_tuple()/list() ◀──────  │   [input, loop, loop, ...]  │
//!                              └────────────────────────────┘
//! ```
//!
//! Checkpoints are append-only per `(thread_id, checkpoint_ns)`; `list`
//! returns them newest-first. Resumption reads the newest (or a named)
//! checkpoint and continues from its recorded `next_nodes`.

pub mod channels;
pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use channels::{
    BinaryOperator, Channel, EphemeralChannel, LastValueChannel, OperatorAggregateChannel,
    TopicChannel, MISSING,
};
pub use checkpoint::{
    ChannelVersion, ChannelVersions, Checkpoint, CheckpointId, CheckpointMetadata,
    CheckpointSource, CheckpointTuple, PendingWrite, RunConfig,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemorySaver;
pub use serializer::{JsonSerializer, SerializerProtocol};
pub use traits::{CheckpointSaver, CheckpointStream};
