//! Graph structure: nodes, edge tables, and sentinels
//!
//! [`GraphSpec`] is the validated structure the engine executes: registered
//! nodes in declaration order plus three edge tables (static, waiting,
//! conditional). It is produced by the builder and never mutated afterwards.
//!
//! Two reserved names mark the virtual source and sink:
//! [`START`] (`__start__`) and [`END`] (`__end__`). Edges from `START`
//! define entry; routing to `END` terminates a branch. Neither may be used
//! as a user node name.

use crate::error::{GraphError, Result};
use crate::node::NodeSpec;
use crate::send::{BranchOutcome, Send};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use weft_checkpoint::RunConfig;

/// Virtual source node: edges out of it define the entry frontier
pub const START: &str = "__start__";

/// Virtual sink node: routing here terminates a branch
pub const END: &str = "__end__";

/// Key in a conditional edge's path map naming the fallback target
pub const DEFAULT_BRANCH: &str = "default";

/// Path function of a conditional edge: `(state, config) -> outcome`
pub type PathFn =
    Arc<dyn Fn(&Value, &RunConfig) -> BranchOutcome + std::marker::Send + std::marker::Sync>;

/// One conditional edge: a path function rooted at `source`, with an
/// optional label-to-node translation map
#[derive(Clone)]
pub struct ConditionalEdge {
    /// Node (or [`START`]) the edge is rooted at
    pub source: String,

    /// Branch name, unique per source
    pub name: String,

    /// Router over the post-step state
    pub path_fn: PathFn,

    /// Label → node translation; a [`DEFAULT_BRANCH`] key supplies a
    /// fallback for unknown labels
    pub path_map: Option<HashMap<String, String>>,
}

impl ConditionalEdge {
    /// Evaluate the path function and resolve its outcome into next nodes
    /// and dynamic dispatches.
    ///
    /// Labels go through the path map when one is set (falling back to the
    /// `default` entry); without a path map a label is already a node name.
    /// An unknown label with no default is an `InvalidGraph` error.
    pub fn resolve(&self, state: &Value, config: &RunConfig) -> Result<(Vec<String>, Vec<Send>)> {
        let mut nodes = Vec::new();
        let mut sends = Vec::new();
        match (self.path_fn)(state, config) {
            BranchOutcome::Label(label) => nodes.push(self.map_label(label)?),
            BranchOutcome::Labels(labels) => {
                for label in labels {
                    nodes.push(self.map_label(label)?);
                }
            }
            BranchOutcome::Dispatch(send) => sends.push(send),
            BranchOutcome::DispatchMany(batch) => sends.extend(batch),
        }
        Ok((nodes, sends))
    }

    fn map_label(&self, label: String) -> Result<String> {
        match &self.path_map {
            None => Ok(label),
            Some(map) => map
                .get(&label)
                .or_else(|| map.get(DEFAULT_BRANCH))
                .cloned()
                .ok_or_else(|| {
                    GraphError::InvalidGraph(format!(
                        "conditional edge '{}' on '{}' returned unknown label '{}' and no default is mapped",
                        self.name, self.source, label
                    ))
                }),
        }
    }
}

impl std::fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("source", &self.source)
            .field("name", &self.name)
            .field("path_fn", &"<function>")
            .field("path_map", &self.path_map)
            .finish()
    }
}

/// Source of an `add_edge` call: one node for a static edge, several for a
/// waiting edge that fires only when all of them executed in one superstep
#[derive(Debug, Clone)]
pub enum EdgeSource {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for EdgeSource {
    fn from(node: &str) -> Self {
        EdgeSource::Single(node.to_string())
    }
}

impl From<String> for EdgeSource {
    fn from(node: String) -> Self {
        EdgeSource::Single(node)
    }
}

impl From<Vec<&str>> for EdgeSource {
    fn from(nodes: Vec<&str>) -> Self {
        EdgeSource::Many(nodes.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for EdgeSource {
    fn from(nodes: Vec<String>) -> Self {
        EdgeSource::Many(nodes)
    }
}

/// Validated graph structure executed by the engine
#[derive(Debug, Clone, Default)]
pub struct GraphSpec {
    pub(crate) nodes: HashMap<String, NodeSpec>,
    pub(crate) node_order: Vec<String>,
    pub(crate) static_edges: Vec<(String, String)>,
    pub(crate) waiting_edges: Vec<(Vec<String>, String)>,
    pub(crate) conditional_edges: Vec<ConditionalEdge>,
}

impl GraphSpec {
    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Node names in declaration order.
    pub fn node_names(&self) -> &[String] {
        &self.node_order
    }

    /// Targets of static edges rooted at `from`, in declaration order.
    pub fn static_targets(&self, from: &str) -> Vec<String> {
        self.static_edges
            .iter()
            .filter(|(src, _)| src == from)
            .map(|(_, dst)| dst.clone())
            .collect()
    }

    /// Conditional edges rooted at `from`, in declaration order.
    pub fn conditionals_from<'a>(
        &'a self,
        from: &'a str,
    ) -> impl Iterator<Item = &'a ConditionalEdge> {
        self.conditional_edges
            .iter()
            .filter(move |edge| edge.source == from)
    }

    /// Waiting edges whose source sets are fully contained in `executed`.
    pub fn fired_waiting_targets(&self, executed: &[String]) -> Vec<String> {
        self.waiting_edges
            .iter()
            .filter(|(sources, _)| sources.iter().all(|s| executed.contains(s)))
            .map(|(_, target)| target.clone())
            .collect()
    }

    /// Adjacency description for introspection.
    pub fn describe(&self) -> GraphInfo {
        let mut edges: Vec<EdgeInfo> = Vec::new();
        for (src, dst) in &self.static_edges {
            edges.push(EdgeInfo {
                sources: vec![src.clone()],
                target: Some(dst.clone()),
                kind: EdgeKind::Static,
                branches: None,
            });
        }
        for (sources, target) in &self.waiting_edges {
            edges.push(EdgeInfo {
                sources: sources.clone(),
                target: Some(target.clone()),
                kind: EdgeKind::Waiting,
                branches: None,
            });
        }
        for edge in &self.conditional_edges {
            edges.push(EdgeInfo {
                sources: vec![edge.source.clone()],
                target: None,
                kind: EdgeKind::Conditional,
                branches: edge.path_map.clone(),
            });
        }
        GraphInfo {
            nodes: self.node_order.clone(),
            edges,
        }
    }
}

/// How an edge routes
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Static,
    Waiting,
    Conditional,
}

/// One edge in a [`GraphInfo`] description
#[derive(Debug, Clone, Serialize)]
pub struct EdgeInfo {
    /// Source node(s); several for a waiting edge
    pub sources: Vec<String>,

    /// Target node; absent for conditional edges, whose targets are in
    /// `branches`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    pub kind: EdgeKind,

    /// Conditional label → node map, when declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<HashMap<String, String>>,
}

/// Adjacency description returned by `get_graph`
#[derive(Debug, Clone, Serialize)]
pub struct GraphInfo {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edge(path_map: Option<HashMap<String, String>>) -> ConditionalEdge {
        ConditionalEdge {
            source: "router".to_string(),
            name: "condition_0".to_string(),
            path_fn: Arc::new(|state, _| {
                BranchOutcome::Label(state["route"].as_str().unwrap_or("?").to_string())
            }),
            path_map,
        }
    }

    #[test]
    fn resolve_without_path_map_uses_label_as_node() {
        let edge = edge(None);
        let (nodes, sends) = edge
            .resolve(&json!({"route": "left"}), &RunConfig::new())
            .unwrap();
        assert_eq!(nodes, vec!["left".to_string()]);
        assert!(sends.is_empty());
    }

    #[test]
    fn resolve_translates_through_path_map() {
        let mut map = HashMap::new();
        map.insert("left".to_string(), "left_node".to_string());
        let edge = edge(Some(map));
        let (nodes, _) = edge
            .resolve(&json!({"route": "left"}), &RunConfig::new())
            .unwrap();
        assert_eq!(nodes, vec!["left_node".to_string()]);
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let mut map = HashMap::new();
        map.insert("known".to_string(), "a".to_string());
        map.insert(DEFAULT_BRANCH.to_string(), "fallback".to_string());
        let edge = edge(Some(map));
        let (nodes, _) = edge
            .resolve(&json!({"route": "mystery"}), &RunConfig::new())
            .unwrap();
        assert_eq!(nodes, vec!["fallback".to_string()]);
    }

    #[test]
    fn resolve_unknown_label_without_default_is_invalid_graph() {
        let mut map = HashMap::new();
        map.insert("known".to_string(), "a".to_string());
        let edge = edge(Some(map));
        let err = edge
            .resolve(&json!({"route": "mystery"}), &RunConfig::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)));
    }

    #[test]
    fn resolve_passes_sends_through() {
        let edge = ConditionalEdge {
            source: "fan".to_string(),
            name: "condition_0".to_string(),
            path_fn: Arc::new(|_, _| {
                BranchOutcome::DispatchMany(vec![
                    Send::new("worker", json!({"task": 1})),
                    Send::new("worker", json!({"task": 2})),
                ])
            }),
            path_map: None,
        };
        let (nodes, sends) = edge.resolve(&json!({}), &RunConfig::new()).unwrap();
        assert!(nodes.is_empty());
        assert_eq!(sends.len(), 2);
    }

    #[test]
    fn edge_source_conversions() {
        assert!(matches!(EdgeSource::from("a"), EdgeSource::Single(s) if s == "a"));
        assert!(matches!(
            EdgeSource::from(vec!["a", "b"]),
            EdgeSource::Many(v) if v.len() == 2
        ));
    }
}
