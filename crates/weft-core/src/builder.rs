//! Graph builder: assemble nodes and edges, validate, compile
//!
//! [`GraphBuilder`] collects nodes, static edges, waiting edges, and
//! conditional edges, then validates the structure at [`compile`] time and
//! hands back an [`Engine`]. All structural problems surface as
//! `InvalidGraph` from `compile`, never at run time:
//!
//! 1. at least one outbound edge from [`START`] exists;
//! 2. every edge endpoint names a known node or a valid sentinel (`START`
//!    only as source, `END` only as target);
//! 3. every node has at least one declared outbound — a static edge, a
//!    conditional edge, or membership in a waiting edge's source set
//!    (a node meant to be reached only via dynamic `Send` still needs a
//!    declared outbound; the builder cannot know the dynamic plan);
//! 4. node names are unique, non-empty, and never sentinels; conditional
//!    branch names are unique per source.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::builder::GraphBuilder;
//! use weft_core::graph::{START, END};
//! use serde_json::json;
//!
//! let mut builder = GraphBuilder::new();
//! builder
//!     .add_node("greet", |state| Box::pin(async move {
//!         Ok(json!({"message": "hello"}).into())
//!     }))
//!     .add_edge(START, "greet")
//!     .add_edge("greet", END);
//!
//! let engine = builder.compile()?;
//! ```
//!
//! [`compile`]: GraphBuilder::compile

use crate::engine::Engine;
use crate::error::{GraphError, Result};
use crate::graph::{ConditionalEdge, EdgeSource, GraphSpec, END, START};
use crate::node::{action_from_state, NodeAction, NodeFuture, NodeSpec};
use crate::schema::StateSchema;
use crate::send::BranchOutcome;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use weft_checkpoint::RunConfig;

/// Builder for workflow graphs
#[derive(Default)]
pub struct GraphBuilder {
    schema: StateSchema,
    nodes: Vec<NodeSpec>,
    static_edges: Vec<(String, String)>,
    waiting_edges: Vec<(Vec<String>, String)>,
    conditional_edges: Vec<ConditionalEdge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with a state schema; updates merge through its reducers.
    pub fn with_schema(schema: StateSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Register a node from a state-only async action.
    ///
    /// The action receives a deep copy of the pre-step state and returns a
    /// `NodeResult` (plain updates convert via `.into()`).
    pub fn add_node<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: Fn(Value) -> NodeFuture + Send + Sync + 'static,
    {
        self.nodes
            .push(NodeSpec::new(name, action_from_state(action)));
        self
    }

    /// Register a node whose action also receives the run config.
    pub fn add_node_with_config<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: Fn(Value, RunConfig) -> NodeFuture + Send + Sync + 'static,
    {
        self.nodes
            .push(NodeSpec::new(name, Arc::new(action) as NodeAction));
        self
    }

    /// Register a fully-specified node (metadata, retry and cache policies).
    pub fn add_node_spec(&mut self, spec: NodeSpec) -> &mut Self {
        self.nodes.push(spec);
        self
    }

    /// Add an edge. A single source adds a static edge; a list of sources
    /// adds a waiting edge whose target fires only when every source
    /// executed in the same superstep.
    pub fn add_edge(&mut self, from: impl Into<EdgeSource>, to: impl Into<String>) -> &mut Self {
        let to = to.into();
        match from.into() {
            EdgeSource::Single(src) => self.static_edges.push((src, to)),
            EdgeSource::Many(sources) => self.waiting_edges.push((sources, to)),
        }
        self
    }

    /// Add conditional edges rooted at `source`. The path function runs
    /// against the post-step state; its labels are translated through
    /// `path_map` when one is given (a `"default"` key supplies a
    /// fallback).
    pub fn add_conditional_edges<F>(
        &mut self,
        source: impl Into<String>,
        path_fn: F,
        path_map: Option<HashMap<String, String>>,
    ) -> &mut Self
    where
        F: Fn(&Value) -> BranchOutcome + Send + Sync + 'static,
    {
        self.add_conditional_edges_with_config(
            source,
            move |state, _config| path_fn(state),
            path_map,
        )
    }

    /// Conditional edges whose path function also receives the run config.
    pub fn add_conditional_edges_with_config<F>(
        &mut self,
        source: impl Into<String>,
        path_fn: F,
        path_map: Option<HashMap<String, String>>,
    ) -> &mut Self
    where
        F: Fn(&Value, &RunConfig) -> BranchOutcome + Send + Sync + 'static,
    {
        let source = source.into();
        let index = self
            .conditional_edges
            .iter()
            .filter(|edge| edge.source == source)
            .count();
        self.conditional_edges.push(ConditionalEdge {
            name: format!("condition_{index}"),
            source,
            path_fn: Arc::new(path_fn),
            path_map,
        });
        self
    }

    /// Register the given nodes and chain them with static edges, in order.
    pub fn add_sequence(&mut self, specs: Vec<NodeSpec>) -> &mut Self {
        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        for spec in specs {
            self.nodes.push(spec);
        }
        for pair in names.windows(2) {
            self.static_edges.push((pair[0].clone(), pair[1].clone()));
        }
        self
    }

    /// Sugar for `add_edge(START, node)`.
    pub fn set_entry_point(&mut self, node: impl Into<String>) -> &mut Self {
        self.add_edge(START, node.into())
    }

    /// Sugar for `add_edge(node, END)`.
    pub fn set_finish_point(&mut self, node: impl Into<String>) -> &mut Self {
        self.add_edge(node.into(), END)
    }

    /// Sugar for conditional edges rooted at [`START`].
    pub fn set_conditional_entry_point<F>(
        &mut self,
        path_fn: F,
        path_map: Option<HashMap<String, String>>,
    ) -> &mut Self
    where
        F: Fn(&Value) -> BranchOutcome + Send + Sync + 'static,
    {
        self.add_conditional_edges(START, path_fn, path_map)
    }

    /// Validate the structure and produce an executable [`Engine`].
    ///
    /// Checkpointing, interrupts, and the recursion limit are configured on
    /// the returned engine (`with_checkpointer`, `with_interrupt_before`,
    /// `with_interrupt_after`, `with_recursion_limit`, `with_debug`).
    ///
    /// # Errors
    ///
    /// `InvalidGraph` describing the first structural problem found.
    pub fn compile(self) -> Result<Engine> {
        let graph = self.validate()?;
        Ok(Engine::new(Arc::new(graph), Arc::new(self.schema)))
    }

    fn validate(&self) -> Result<GraphSpec> {
        let mut spec = GraphSpec::default();

        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(GraphError::InvalidGraph(
                    "node names must be non-empty".to_string(),
                ));
            }
            if node.name == START || node.name == END {
                return Err(GraphError::InvalidGraph(format!(
                    "'{}' is a reserved sentinel and cannot name a node",
                    node.name
                )));
            }
            if spec.nodes.contains_key(&node.name) {
                return Err(GraphError::InvalidGraph(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
            spec.node_order.push(node.name.clone());
            spec.nodes.insert(node.name.clone(), node.clone());
        }

        for (src, dst) in &self.static_edges {
            if src == END {
                return Err(GraphError::InvalidGraph(
                    "END cannot be an edge source".to_string(),
                ));
            }
            if dst == START {
                return Err(GraphError::InvalidGraph(
                    "START cannot be an edge target".to_string(),
                ));
            }
            if src != START && !spec.nodes.contains_key(src) {
                return Err(GraphError::InvalidGraph(format!(
                    "edge source '{src}' is not a known node"
                )));
            }
            if dst != END && !spec.nodes.contains_key(dst) {
                return Err(GraphError::InvalidGraph(format!(
                    "edge target '{dst}' is not a known node"
                )));
            }
        }

        for (sources, target) in &self.waiting_edges {
            if sources.is_empty() {
                return Err(GraphError::InvalidGraph(
                    "waiting edges need at least one source".to_string(),
                ));
            }
            for src in sources {
                if !spec.nodes.contains_key(src) {
                    return Err(GraphError::InvalidGraph(format!(
                        "waiting edge source '{src}' is not a known node"
                    )));
                }
            }
            if target != END && !spec.nodes.contains_key(target) {
                return Err(GraphError::InvalidGraph(format!(
                    "waiting edge target '{target}' is not a known node"
                )));
            }
        }

        let mut branch_names: HashSet<(String, String)> = HashSet::new();
        for edge in &self.conditional_edges {
            if edge.source != START && !spec.nodes.contains_key(&edge.source) {
                return Err(GraphError::InvalidGraph(format!(
                    "conditional edge source '{}' is not a known node",
                    edge.source
                )));
            }
            if !branch_names.insert((edge.source.clone(), edge.name.clone())) {
                return Err(GraphError::InvalidGraph(format!(
                    "duplicate conditional branch '{}' on '{}'",
                    edge.name, edge.source
                )));
            }
            if let Some(map) = &edge.path_map {
                for target in map.values() {
                    if target != END && !spec.nodes.contains_key(target) {
                        return Err(GraphError::InvalidGraph(format!(
                            "conditional branch target '{target}' is not a known node"
                        )));
                    }
                }
            }
        }

        let start_has_outbound = self.static_edges.iter().any(|(src, _)| src == START)
            || self.conditional_edges.iter().any(|e| e.source == START);
        if !start_has_outbound {
            return Err(GraphError::InvalidGraph(
                "graph has no entry point: add an edge or conditional edge from START".to_string(),
            ));
        }

        for name in &spec.node_order {
            let has_static = self.static_edges.iter().any(|(src, _)| src == name);
            let has_conditional = self.conditional_edges.iter().any(|e| &e.source == name);
            let in_waiting = self
                .waiting_edges
                .iter()
                .any(|(sources, _)| sources.contains(name));
            if !has_static && !has_conditional && !in_waiting {
                return Err(GraphError::InvalidGraph(format!(
                    "node '{name}' has no outgoing edges; every node needs a declared outbound"
                )));
            }
        }

        spec.static_edges = self.static_edges.clone();
        spec.waiting_edges = self.waiting_edges.clone();
        spec.conditional_edges = self.conditional_edges.clone();
        Ok(spec)
    }
}
