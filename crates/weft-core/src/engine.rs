//! Pregel-style superstep executor
//!
//! [`Engine`] runs a compiled graph to completion under a bulk-synchronous
//! discipline. Each superstep:
//!
//! ```text
//!   ┌─▶ plan      resolve the frontier (static / conditional / waiting /
//!   │             Command goto / Send dispatch)
//!   │   execute   every frontier node gets a deep copy of the pre-step
//!   │             state; results are classified into update buckets,
//!   │             successor declarations, and Send dispatches
//!   │   merge     buckets fold into state through the schema's reducers,
//!   │             atomically, after a single-writer check on last-value
//!   │             fields
//!   │   emit      one `updates` event, then one `values` event
//!   │   dispatch  queued Sends run against private state copies, still in
//!   │             this superstep
//!   └── persist   checkpoint, bump the step counter, repeat
//! ```
//!
//! The loop ends when the frontier holds nothing but `END`, or errors when
//! the step counter reaches the recursion limit. Interrupt points pause the
//! run by checkpointing first and then surfacing `GraphError::Interrupt`;
//! invoking again with null input and the same thread config resumes from
//! the recorded frontier.

use crate::cache::NodeCache;
use crate::command::GotoTarget;
use crate::error::{BoxError, GraphError, Result};
use crate::graph::{GraphInfo, GraphSpec, END};
use crate::interrupt::{interrupt_matches, Interrupt};
use crate::node::{NodeResult, NodeSpec};
use crate::schema::StateSchema;
use crate::send::Send as SendTask;
use crate::snapshot::StateSnapshot;
use crate::stream::{StreamEvent, StreamMode};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;
use weft_checkpoint::{
    ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointSaver, CheckpointSource, RunConfig,
};

/// Default superstep budget per invocation
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Lazy stream of execution events returned by [`Engine::stream`]
pub type EventStream = Pin<Box<dyn futures::Stream<Item = Result<StreamEvent>> + std::marker::Send>>;

/// Executable workflow graph
///
/// Produced by `GraphBuilder::compile`; cheap to clone (all shared parts are
/// reference-counted). Checkpointing, interrupts, and the recursion limit
/// are configured with the `with_*` builder methods.
#[derive(Clone)]
pub struct Engine {
    graph: Arc<GraphSpec>,
    schema: Arc<StateSchema>,
    saver: Option<Arc<dyn CheckpointSaver>>,
    interrupt_before: Vec<String>,
    interrupt_after: Vec<String>,
    recursion_limit: usize,
    debug: bool,
    cache: Arc<NodeCache>,
}

impl Engine {
    pub(crate) fn new(graph: Arc<GraphSpec>, schema: Arc<StateSchema>) -> Self {
        Self {
            graph,
            schema,
            saver: None,
            interrupt_before: Vec::new(),
            interrupt_after: Vec::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            debug: false,
            cache: Arc::new(NodeCache::new()),
        }
    }

    /// Attach a checkpoint saver. Checkpoints are written only when the run
    /// config also carries a `thread_id`.
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.saver = Some(saver);
        self
    }

    /// Pause before any of these nodes executes (`"*"` matches all).
    pub fn with_interrupt_before(mut self, nodes: Vec<String>) -> Self {
        self.interrupt_before = nodes;
        self
    }

    /// Pause after any of these nodes executed (`"*"` matches all).
    pub fn with_interrupt_after(mut self, nodes: Vec<String>) -> Self {
        self.interrupt_after = nodes;
        self
    }

    /// Default superstep budget; a run config may override it.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Emit debug-level traces for every superstep.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Adjacency description of the compiled graph.
    pub fn get_graph(&self) -> GraphInfo {
        self.graph.describe()
    }

    /// Run to completion with default configuration.
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        self.invoke_with_config(input, None).await
    }

    /// Run to completion. With a saver and a `thread_id` in the config, the
    /// run resumes from that thread's latest (or named) checkpoint; null
    /// input resumes the recorded frontier after an interrupt.
    #[tracing::instrument(skip(self, input, config), fields(nodes = self.graph.node_names().len()))]
    pub async fn invoke_with_config(&self, input: Value, config: Option<RunConfig>) -> Result<Value> {
        self.run(input, config, None).await
    }

    /// Run while lazily streaming events in the requested modes. Within a
    /// superstep the order is one `Updates` event then one `Values` event;
    /// a final `Values` event fires at exit. Errors end the stream as a
    /// final `Err` item.
    pub fn stream(
        &self,
        input: Value,
        config: Option<RunConfig>,
        modes: Vec<StreamMode>,
    ) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<StreamEvent>>(16);
        let engine = self.clone();
        let emitter = Emitter {
            tx: tx.clone(),
            modes,
        };
        tokio::spawn(async move {
            if let Err(err) = engine.run(input, config, Some(emitter)).await {
                let _ = tx.send(Err(err)).await;
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }

    /// Read-only snapshot of a thread's state: the checkpoint named by the
    /// config, or the newest one. `None` without a saver, a thread id, or a
    /// matching checkpoint.
    pub async fn get_state(&self, config: &RunConfig) -> Result<Option<StateSnapshot>> {
        let saver = match &self.saver {
            Some(saver) => saver,
            None => return Ok(None),
        };
        if config.thread_id.is_none() {
            return Ok(None);
        }
        Ok(saver.get_tuple(config).await?.map(StateSnapshot::from))
    }

    /// Apply `values` to a thread's current state through the schema and
    /// save the result as a new checkpoint (`source = update`, step
    /// advanced by one). `as_node` attributes the write in metadata.
    /// Returns the config of the new checkpoint, or `None` when there is
    /// nothing to update.
    pub async fn update_state(
        &self,
        config: &RunConfig,
        values: Value,
        as_node: Option<&str>,
    ) -> Result<Option<RunConfig>> {
        let saver = match &self.saver {
            Some(saver) => saver.clone(),
            None => return Ok(None),
        };
        let tuple = match saver.get_tuple(config).await? {
            Some(tuple) => tuple,
            None => return Ok(None),
        };

        let mut state = Value::Object(tuple.checkpoint.channel_values.into_iter().collect());
        self.schema.apply(&mut state, &values)?;

        let mut versions = tuple.checkpoint.channel_versions;
        bump_versions(&mut versions, &values)?;

        let mut metadata = CheckpointMetadata::new()
            .with_source(CheckpointSource::Update)
            .with_step(tuple.metadata.step.unwrap_or(0) + 1);
        if let Some(node) = as_node {
            let mut writes = serde_json::Map::new();
            writes.insert(node.to_string(), values);
            metadata = metadata.with_extra("writes", Value::Object(writes));
        }

        let checkpoint = Checkpoint::new(
            Uuid::new_v4().to_string(),
            value_to_channel_map(&state),
            versions.clone(),
            tuple.checkpoint.versions_seen,
            tuple.checkpoint.next_nodes,
        );

        tracing::debug!(thread = ?tuple.config.thread_id, "saving manual state update");
        let new_config = saver
            .put(&tuple.config, checkpoint, metadata, versions)
            .await?;
        Ok(Some(new_config))
    }

    async fn run(
        &self,
        input: Value,
        config: Option<RunConfig>,
        emitter: Option<Emitter>,
    ) -> Result<Value> {
        let config = config.unwrap_or_default();
        let limit = config.recursion_limit().unwrap_or(self.recursion_limit);

        // Initialise state, either from a checkpoint or from schema defaults.
        let mut persister = match (&self.saver, &config.thread_id) {
            (Some(saver), Some(_)) => Some(Persister {
                saver: saver.clone(),
                config: config.clone(),
            }),
            _ => None,
        };

        let mut state = self.schema.initial_state();
        let mut versions: ChannelVersions = ChannelVersions::new();
        let mut versions_seen: HashMap<String, ChannelVersions> = HashMap::new();
        let mut resumed_frontier: Option<Vec<String>> = None;
        let mut resume_exempt: Vec<String> = Vec::new();

        if let Some(p) = &persister {
            if let Some(tuple) = p.saver.get_tuple(&config).await? {
                tracing::debug!(
                    checkpoint = %tuple.checkpoint.id,
                    step = ?tuple.metadata.step,
                    "resuming from checkpoint"
                );
                state = Value::Object(tuple.checkpoint.channel_values.into_iter().collect());
                versions = tuple.checkpoint.channel_versions;
                versions_seen = tuple.checkpoint.versions_seen;
                if input.is_null() && !tuple.checkpoint.next_nodes.is_empty() {
                    resumed_frontier = Some(tuple.checkpoint.next_nodes.clone());
                    if tuple.metadata.source == Some(CheckpointSource::Interrupt) {
                        resume_exempt = tuple.checkpoint.next_nodes;
                    }
                }
            } else if input.is_null() {
                return Err(GraphError::EmptyInput);
            }
        } else if input.is_null() {
            return Err(GraphError::EmptyInput);
        }

        // Overlay the input; non-object inputs are ignored as overlays.
        if input.is_object() {
            self.schema.apply(&mut state, &input)?;
            bump_versions(&mut versions, &input)?;
        }

        // Resolve the initial frontier.
        let mut pending_sends: Vec<SendTask> = Vec::new();
        let mut frontier = match resumed_frontier {
            Some(frontier) => frontier,
            None => {
                let mut targets = self.graph.static_targets(crate::graph::START);
                for edge in self.graph.conditionals_from(crate::graph::START) {
                    let (nodes, sends) = edge.resolve(&state, &config)?;
                    targets.extend(nodes);
                    pending_sends.extend(sends);
                }
                targets
            }
        };
        dedup_in_place(&mut frontier);

        let mut step: i64 = 0;

        if let Some(p) = &mut persister {
            p.save(
                &state,
                &versions,
                &versions_seen,
                frontier.clone(),
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Input)
                    .with_step(step)
                    .with_parents(HashMap::new()),
            )
            .await?;
        }

        while frontier.iter().any(|n| n != END) || !pending_sends.is_empty() {
            if step >= limit as i64 {
                tracing::warn!(limit, "recursion limit reached");
                return Err(GraphError::Recursion { limit });
            }

            let runnable: Vec<String> = frontier.iter().filter(|n| *n != END).cloned().collect();
            if self.debug {
                tracing::debug!(step, frontier = ?runnable, state = %state, "starting superstep");
            } else {
                tracing::debug!(step, frontier = ?runnable, "starting superstep");
            }

            // Interrupt-before checks run for the whole frontier before any
            // node executes. A node just resumed into is exempt once.
            for node in &runnable {
                if interrupt_matches(&self.interrupt_before, node)
                    && !resume_exempt.iter().any(|n| n == node)
                {
                    let interrupt =
                        Interrupt::new(json!(format!("Interrupted before '{node}'")));
                    if let Some(p) = &mut persister {
                        p.save(
                            &state,
                            &versions,
                            &versions_seen,
                            vec![node.clone()],
                            CheckpointMetadata::new()
                                .with_source(CheckpointSource::Interrupt)
                                .with_step(step)
                                .with_extra(
                                    "interrupts",
                                    serde_json::to_value(vec![&interrupt])?,
                                ),
                        )
                        .await?;
                    }
                    tracing::info!(node = %node, "interrupted before node");
                    return Err(GraphError::interrupted(interrupt));
                }
            }
            resume_exempt.clear();

            // Execute: every node sees the same pre-step snapshot.
            let snapshot = state.clone();
            let mut buckets: Vec<(String, Value)> = Vec::new();
            let mut next_from_commands: Vec<String> = Vec::new();
            let mut sends: Vec<SendTask> = std::mem::take(&mut pending_sends);
            let mut executed: Vec<String> = Vec::new();

            for node in &runnable {
                let spec = self.node_spec(node)?;
                versions_seen.insert(node.clone(), versions.clone());
                let result = self.call_node(spec, snapshot.clone(), &config).await?;
                classify(node, result, &mut buckets, &mut next_from_commands, &mut sends)?;
                executed.push(node.clone());
            }

            // All buckets are collected before anything merges, so a
            // single-writer violation leaves the pre-step state intact.
            check_single_writer(&self.schema, &buckets)?;

            for (_, update) in &buckets {
                self.schema.apply(&mut state, update)?;
                bump_versions(&mut versions, update)?;
            }

            if let Some(emitter) = &emitter {
                let updates: HashMap<String, Value> =
                    buckets.iter().cloned().collect();
                emitter.emit_updates(step, &updates).await;
                emitter.emit_values(step, &state).await;
            }

            // Successors from declared edges, evaluated on the merged state.
            let mut next_from_edges: Vec<String> = Vec::new();
            for node in &executed {
                next_from_edges.extend(self.graph.static_targets(node));
                for edge in self.graph.conditionals_from(node) {
                    let (nodes, edge_sends) = edge.resolve(&state, &config)?;
                    next_from_edges.extend(nodes);
                    sends.extend(edge_sends);
                }
            }
            next_from_edges.extend(self.graph.fired_waiting_targets(&executed));

            // Drain Sends within this superstep. Each runs on a private
            // copy of the current state with its arg overlaid; results
            // merge straight into live state.
            let mut queue: VecDeque<SendTask> = sends.into();
            while let Some(send) = queue.pop_front() {
                let (target, arg) = send.into_parts();
                let spec = self.node_spec(&target)?;
                tracing::debug!(step, node = %target, "dispatching send");

                let mut send_state = state.clone();
                if arg.is_object() {
                    self.schema.apply(&mut send_state, &arg)?;
                }

                versions_seen.insert(target.clone(), versions.clone());
                let result = self.call_node(spec, send_state, &config).await?;

                let mut send_buckets: Vec<(String, Value)> = Vec::new();
                let mut send_sends: Vec<SendTask> = Vec::new();
                classify(
                    &target,
                    result,
                    &mut send_buckets,
                    &mut next_from_commands,
                    &mut send_sends,
                )?;
                for (_, update) in &send_buckets {
                    self.schema.apply(&mut state, update)?;
                    bump_versions(&mut versions, update)?;
                }
                queue.extend(send_sends);
            }

            let mut next_frontier = next_from_edges;
            next_frontier.extend(next_from_commands);
            dedup_in_place(&mut next_frontier);

            // Interrupt-after checks, with the next frontier already known
            // so a resume continues where the run left off.
            for node in &runnable {
                if interrupt_matches(&self.interrupt_after, node) {
                    let interrupt =
                        Interrupt::new(json!(format!("Interrupted after '{node}'")));
                    if let Some(p) = &mut persister {
                        p.save(
                            &state,
                            &versions,
                            &versions_seen,
                            next_frontier.clone(),
                            CheckpointMetadata::new()
                                .with_source(CheckpointSource::Interrupt)
                                .with_step(step)
                                .with_extra(
                                    "interrupts",
                                    serde_json::to_value(vec![&interrupt])?,
                                ),
                        )
                        .await?;
                    }
                    tracing::info!(node = %node, "interrupted after node");
                    return Err(GraphError::interrupted(interrupt));
                }
            }

            frontier = next_frontier;
            step += 1;

            if let Some(p) = &mut persister {
                p.save(
                    &state,
                    &versions,
                    &versions_seen,
                    frontier.clone(),
                    CheckpointMetadata::new()
                        .with_source(CheckpointSource::Loop)
                        .with_step(step)
                        .with_parents(HashMap::new()),
                )
                .await?;
            }
        }

        if let Some(p) = &mut persister {
            p.save(
                &state,
                &versions,
                &versions_seen,
                Vec::new(),
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Exit)
                    .with_step(step),
            )
            .await?;
        }
        if let Some(emitter) = &emitter {
            emitter.emit_values(step, &state).await;
        }
        tracing::debug!(step, "run complete");
        Ok(state)
    }

    fn node_spec(&self, name: &str) -> Result<&NodeSpec> {
        self.graph.node(name).ok_or_else(|| {
            GraphError::InvalidGraph(format!("'{name}' was scheduled but is not a known node"))
        })
    }

    /// Invoke one node with retry and caching applied. Engine control
    /// errors raised inside the body escape unwrapped; anything else is
    /// retried per the node's policy and finally wrapped in
    /// `NodeExecution`.
    async fn call_node(
        &self,
        spec: &NodeSpec,
        snapshot: Value,
        config: &RunConfig,
    ) -> Result<NodeResult> {
        if spec.cache_policy.is_some() {
            if let Some(update) = self.cache.get(&spec.name, &snapshot) {
                tracing::debug!(node = %spec.name, "cache hit");
                return Ok(NodeResult::Update(update));
            }
        }

        let mut attempt: usize = 0;
        loop {
            match (spec.action)(snapshot.clone(), config.clone()).await {
                Ok(result) => {
                    if let (Some(policy), NodeResult::Update(update)) =
                        (&spec.cache_policy, &result)
                    {
                        self.cache.put(&spec.name, &snapshot, update.clone(), policy);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    let err: BoxError = match err.downcast::<GraphError>() {
                        Ok(graph_err) => match *graph_err {
                            escape @ GraphError::Interrupt(_) => return Err(escape),
                            escape @ GraphError::Recursion { .. } => return Err(escape),
                            other => Box::new(other),
                        },
                        Err(err) => err,
                    };

                    let retry = spec
                        .retry_policy
                        .as_ref()
                        .filter(|p| attempt + 1 < p.max_attempts && p.should_retry(&err));
                    match retry {
                        Some(policy) => {
                            let delay = policy.interval_for(attempt);
                            tracing::warn!(
                                node = %spec.name,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "node failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => return Err(GraphError::node_execution(&spec.name, err)),
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("nodes", &self.graph.node_names())
            .field("checkpointer", &self.saver.is_some())
            .field("interrupt_before", &self.interrupt_before)
            .field("interrupt_after", &self.interrupt_after)
            .field("recursion_limit", &self.recursion_limit)
            .finish()
    }
}

/// Checkpoint writer whose config evolves so each save records the previous
/// checkpoint as parent
struct Persister {
    saver: Arc<dyn CheckpointSaver>,
    config: RunConfig,
}

impl Persister {
    async fn save(
        &mut self,
        state: &Value,
        versions: &ChannelVersions,
        versions_seen: &HashMap<String, ChannelVersions>,
        next_nodes: Vec<String>,
        metadata: CheckpointMetadata,
    ) -> Result<()> {
        let checkpoint = Checkpoint::new(
            Uuid::new_v4().to_string(),
            value_to_channel_map(state),
            versions.clone(),
            versions_seen.clone(),
            next_nodes,
        );
        tracing::debug!(checkpoint = %checkpoint.id, source = ?metadata.source, "saving checkpoint");
        self.config = self
            .saver
            .put(&self.config, checkpoint, metadata, versions.clone())
            .await?;
        Ok(())
    }
}

/// Event sink for `stream`; sends are fire-and-forget once the consumer
/// hangs up.
struct Emitter {
    tx: tokio::sync::mpsc::Sender<Result<StreamEvent>>,
    modes: Vec<StreamMode>,
}

impl Emitter {
    async fn emit_updates(&self, step: i64, updates: &HashMap<String, Value>) {
        if self.modes.contains(&StreamMode::Updates) {
            let _ = self
                .tx
                .send(Ok(StreamEvent::Updates {
                    step,
                    updates: updates.clone(),
                }))
                .await;
        }
        if self.modes.contains(&StreamMode::Debug) {
            let _ = self.tx.send(Ok(StreamEvent::debug_updates(step, updates))).await;
        }
    }

    async fn emit_values(&self, step: i64, state: &Value) {
        if self.modes.contains(&StreamMode::Values) {
            let _ = self
                .tx
                .send(Ok(StreamEvent::Values {
                    step,
                    state: state.clone(),
                }))
                .await;
        }
        if self.modes.contains(&StreamMode::Debug) {
            let _ = self.tx.send(Ok(StreamEvent::debug_values(step, state))).await;
        }
    }
}

/// Sort a node's result into its update bucket, successor declarations,
/// and Send dispatches. Bundles recurse element-wise; nested updates merge
/// left-to-right into the node's bucket.
fn classify(
    node: &str,
    result: NodeResult,
    buckets: &mut Vec<(String, Value)>,
    next_from_commands: &mut Vec<String>,
    sends: &mut Vec<SendTask>,
) -> Result<()> {
    match result {
        NodeResult::Update(update) => {
            if update.is_object() {
                merge_into_bucket(buckets, node, update);
            }
            // anything else is an empty update
        }
        NodeResult::Command(command) => {
            if command.graph.is_some() {
                return Err(GraphError::InvalidGraph(format!(
                    "node '{node}' returned a Command with a graph target; subgraph handoff is reserved"
                )));
            }
            if let Some(update) = command.update {
                if update.is_object() {
                    merge_into_bucket(buckets, &format!("{node}:command"), update);
                }
            }
            for target in command.goto {
                match target {
                    GotoTarget::Node(next) => next_from_commands.push(next),
                    GotoTarget::Dispatch(send) => sends.push(send),
                }
            }
        }
        NodeResult::Send(send) => sends.push(send),
        NodeResult::Many(results) => {
            for result in results {
                classify(node, result, buckets, next_from_commands, sends)?;
            }
        }
    }
    Ok(())
}

fn merge_into_bucket(buckets: &mut Vec<(String, Value)>, key: &str, update: Value) {
    let incoming = match update {
        Value::Object(map) => map,
        _ => return,
    };
    match buckets.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => {
            if let Some(existing) = existing.as_object_mut() {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
        }
        None => buckets.push((key.to_string(), Value::Object(incoming))),
    }
}

/// Reject a superstep in which two different writers hit the same
/// last-value field. Detection runs over the aggregate of all buckets
/// before any merge; the reported field is the one whose conflicting
/// writer pair sorts lexicographically smallest, which keeps the error
/// deterministic regardless of execution order.
fn check_single_writer(schema: &StateSchema, buckets: &[(String, Value)]) -> Result<()> {
    let mut writers: HashMap<&str, Vec<&str>> = HashMap::new();
    for (bucket, update) in buckets {
        if let Some(update) = update.as_object() {
            for key in update.keys() {
                if !schema.has_reducer(key) {
                    writers.entry(key.as_str()).or_default().push(bucket.as_str());
                }
            }
        }
    }

    let mut smallest: Option<((String, String), String)> = None;
    for (key, mut names) in writers {
        if names.len() < 2 {
            continue;
        }
        names.sort_unstable();
        let pair = (names[0].to_string(), names[1].to_string());
        let replace = match &smallest {
            Some((best_pair, _)) => pair < *best_pair,
            None => true,
        };
        if replace {
            smallest = Some((pair, key.to_string()));
        }
    }

    match smallest {
        Some((_, key)) => Err(GraphError::single_value_violation(&key)),
        None => Ok(()),
    }
}

fn bump_versions(versions: &mut ChannelVersions, update: &Value) -> Result<()> {
    if let Some(update) = update.as_object() {
        for key in update.keys() {
            let current = versions.entry(key.clone()).or_default();
            *current = current.next()?;
        }
    }
    Ok(())
}

fn value_to_channel_map(state: &Value) -> HashMap<String, Value> {
    state
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn dedup_in_place(nodes: &mut Vec<String>) {
    let mut seen = HashSet::new();
    nodes.retain(|node| seen.insert(node.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::reducers::SumConcatReducer;
    use crate::schema::FieldSpec;

    fn schema_with_reducer(field: &str) -> StateSchema {
        StateSchema::new()
            .with_field(FieldSpec::new(field).with_reducer(Arc::new(SumConcatReducer)))
    }

    #[test]
    fn classify_update_goes_to_node_bucket() {
        let mut buckets = Vec::new();
        let mut next = Vec::new();
        let mut sends = Vec::new();
        classify(
            "a",
            NodeResult::Update(json!({"x": 1})),
            &mut buckets,
            &mut next,
            &mut sends,
        )
        .unwrap();

        assert_eq!(buckets, vec![("a".to_string(), json!({"x": 1}))]);
        assert!(next.is_empty());
        assert!(sends.is_empty());
    }

    #[test]
    fn classify_non_object_update_is_empty() {
        let mut buckets = Vec::new();
        classify(
            "a",
            NodeResult::Update(json!(42)),
            &mut buckets,
            &mut Vec::new(),
            &mut Vec::new(),
        )
        .unwrap();
        assert!(buckets.is_empty());
    }

    #[test]
    fn classify_command_splits_update_goto_and_sends() {
        let mut buckets = Vec::new();
        let mut next = Vec::new();
        let mut sends = Vec::new();
        let command = Command::new()
            .with_update(json!({"done": true}))
            .with_goto("later")
            .with_goto(SendTask::new("worker", json!({"task": 1})));
        classify("a", command.into(), &mut buckets, &mut next, &mut sends).unwrap();

        assert_eq!(buckets, vec![("a:command".to_string(), json!({"done": true}))]);
        assert_eq!(next, vec!["later".to_string()]);
        assert_eq!(sends.len(), 1);
    }

    #[test]
    fn classify_rejects_reserved_graph_field() {
        let command = Command::new().with_graph("sub");
        let err = classify(
            "a",
            command.into(),
            &mut Vec::new(),
            &mut Vec::new(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)));
    }

    #[test]
    fn classify_bundle_merges_left_to_right() {
        let mut buckets = Vec::new();
        let bundle = NodeResult::Many(vec![
            NodeResult::Update(json!({"x": 1, "y": 1})),
            NodeResult::Update(json!({"y": 2})),
            NodeResult::Send(SendTask::new("worker", json!({}))),
        ]);
        let mut sends = Vec::new();
        classify("a", bundle, &mut buckets, &mut Vec::new(), &mut sends).unwrap();

        assert_eq!(buckets, vec![("a".to_string(), json!({"x": 1, "y": 2}))]);
        assert_eq!(sends.len(), 1);
    }

    #[test]
    fn single_writer_violation_names_the_field() {
        let schema = StateSchema::new();
        let buckets = vec![
            ("b".to_string(), json!({"value": 1})),
            ("a".to_string(), json!({"value": 2})),
        ];
        let err = check_single_writer(&schema, &buckets).unwrap_err();
        assert_eq!(
            err.to_string(),
            "At key 'value': Can receive only one value per step."
        );
    }

    #[test]
    fn single_writer_allows_reducer_fields() {
        let schema = schema_with_reducer("items");
        let buckets = vec![
            ("a".to_string(), json!({"items": [1]})),
            ("b".to_string(), json!({"items": [2]})),
        ];
        assert!(check_single_writer(&schema, &buckets).is_ok());
    }

    #[test]
    fn single_writer_reports_smallest_conflicting_pair() {
        let schema = StateSchema::new();
        // two conflicts: ("x" via c,d) and ("y" via a,b); (a,b) < (c,d)
        let buckets = vec![
            ("c".to_string(), json!({"x": 1})),
            ("d".to_string(), json!({"x": 2})),
            ("a".to_string(), json!({"y": 1})),
            ("b".to_string(), json!({"y": 2})),
        ];
        let err = check_single_writer(&schema, &buckets).unwrap_err();
        assert!(err.to_string().contains("'y'"));
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let mut nodes = vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ];
        dedup_in_place(&mut nodes);
        assert_eq!(nodes, vec!["b", "a", "c"]);
    }

    #[test]
    fn bump_versions_increments_written_keys() {
        let mut versions = ChannelVersions::new();
        bump_versions(&mut versions, &json!({"a": 1})).unwrap();
        bump_versions(&mut versions, &json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(versions["a"], weft_checkpoint::ChannelVersion::Int(2));
        assert_eq!(versions["b"], weft_checkpoint::ChannelVersion::Int(1));
    }
}
