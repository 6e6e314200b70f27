//! weft-core: a stateful workflow execution engine
//!
//! Runs a directed graph of user-defined async computations under a bulk
//! synchronous (Pregel-style) discipline. Per superstep, a frontier of
//! active nodes reads a frozen snapshot of shared state, returns updates,
//! and those updates merge into state atomically through per-field reducers
//! before the next superstep is planned.
//!
//! # Building blocks
//!
//! - [`schema`] / [`reducers`] — declare state fields, their defaults, and
//!   how concurrent writes merge
//! - [`builder`] — assemble nodes and edges (static, conditional, waiting),
//!   validated at compile time
//! - [`engine`] — the superstep executor: frontier resolution, snapshot
//!   execution, atomic merge, checkpointing, interrupts, streaming
//! - [`send`] / [`command`] — dynamic routing: per-step fan-out dispatches
//!   and node-declared successors
//! - [`retry`] / [`cache`] — per-node retry backoff and result caching
//! - [`interrupt`] — human-in-the-loop pauses, checkpointed before they
//!   surface
//!
//! # Quick start
//!
//! ```rust,ignore
//! use weft_core::{GraphBuilder, START, END};
//! use serde_json::json;
//!
//! let mut builder = GraphBuilder::new();
//! builder
//!     .add_node("a", |state| Box::pin(async move {
//!         let value = state["value"].as_str().unwrap_or("").to_string();
//!         Ok(json!({"value": format!("{value}a")}).into())
//!     }))
//!     .add_edge(START, "a")
//!     .add_edge("a", END);
//!
//! let engine = builder.compile()?;
//! let result = engine.invoke(json!({"value": ""})).await?;
//! assert_eq!(result["value"], "a");
//! ```
//!
//! Checkpointing and resumption come from pairing the engine with a
//! [`weft_checkpoint::CheckpointSaver`]; see [`engine::Engine::with_checkpointer`].

pub mod builder;
pub mod cache;
pub mod command;
pub mod engine;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod node;
pub mod reducers;
pub mod retry;
pub mod schema;
pub mod send;
pub mod snapshot;
pub mod stream;

pub use builder::GraphBuilder;
pub use cache::{CachePolicy, NodeCache};
pub use command::{Command, GotoTarget};
pub use engine::{Engine, EventStream, DEFAULT_RECURSION_LIMIT};
pub use error::{BoxError, GraphError, Result};
pub use graph::{
    ConditionalEdge, EdgeInfo, EdgeKind, EdgeSource, GraphInfo, GraphSpec, PathFn, DEFAULT_BRANCH,
    END, START,
};
pub use interrupt::{interrupt_matches, Interrupt, INTERRUPT_WILDCARD};
pub use node::{
    action_from_nullary, action_from_state, NodeAction, NodeFuture, NodeResult, NodeSpec,
};
pub use reducers::{
    AppendReducer, MergeReducer, MessageMergeReducer, Reducer, ReplaceReducer, StateError,
    SumConcatReducer,
};
pub use retry::{RetryPolicy, RetryPredicate};
pub use schema::{FieldSpec, StateSchema};
pub use send::{BranchOutcome, Send};
pub use snapshot::StateSnapshot;
pub use stream::{StreamEvent, StreamMode};
pub use weft_checkpoint::RunConfig;
