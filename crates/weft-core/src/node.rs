//! Node specifications and result classification
//!
//! A node is a named async action over a frozen state snapshot. Its return
//! value is the explicit sum type [`NodeResult`]: a plain update, a
//! [`Command`] (update + routing), a [`Send`] dispatch, or a bundle of
//! those processed element-wise. `From` impls keep the common case — just
//! return a state object — a one-liner: `Ok(json!({...}).into())`.
//!
//! The canonical action capability is two-argument, `(state, config)`;
//! adapters wrap actions that ignore the config or both arguments.

use crate::cache::CachePolicy;
use crate::command::Command;
use crate::error::BoxError;
use crate::retry::RetryPolicy;
use crate::send::Send as SendTask;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use weft_checkpoint::RunConfig;

/// Future returned by a node action
pub type NodeFuture = Pin<Box<dyn Future<Output = Result<NodeResult, BoxError>> + Send>>;

/// Canonical node capability: async `(state, config) -> NodeResult`
pub type NodeAction = Arc<dyn Fn(Value, RunConfig) -> NodeFuture + Send + Sync>;

/// What a node's execution produced
#[derive(Debug, Clone)]
pub enum NodeResult {
    /// A state update, merged through the schema's reducers. Non-object
    /// values are treated as an empty update.
    Update(Value),

    /// An update plus successor declarations
    Command(Command),

    /// One extra invocation dispatched within the current superstep
    Send(SendTask),

    /// Several results, processed element-wise; nested updates merge
    /// left-to-right into this node's update bucket
    Many(Vec<NodeResult>),
}

impl NodeResult {
    /// An update that changes nothing.
    pub fn empty() -> Self {
        NodeResult::Update(Value::Object(serde_json::Map::new()))
    }
}

impl From<Value> for NodeResult {
    fn from(value: Value) -> Self {
        NodeResult::Update(value)
    }
}

impl From<Command> for NodeResult {
    fn from(command: Command) -> Self {
        NodeResult::Command(command)
    }
}

impl From<SendTask> for NodeResult {
    fn from(send: SendTask) -> Self {
        NodeResult::Send(send)
    }
}

impl From<Vec<NodeResult>> for NodeResult {
    fn from(results: Vec<NodeResult>) -> Self {
        NodeResult::Many(results)
    }
}

/// A registered node: action plus policies
#[derive(Clone)]
pub struct NodeSpec {
    /// Unique name; never a sentinel
    pub name: String,

    /// The async action
    pub action: NodeAction,

    /// Free-form metadata surfaced by `get_graph`
    pub metadata: HashMap<String, Value>,

    /// Retry configuration, if any
    pub retry_policy: Option<RetryPolicy>,

    /// Result caching configuration, if any
    pub cache_policy: Option<CachePolicy>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, action: NodeAction) -> Self {
        Self {
            name: name.into(),
            action,
            metadata: HashMap::new(),
            retry_policy: None,
            cache_policy: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("action", &"<function>")
            .field("metadata", &self.metadata)
            .field("retry_policy", &self.retry_policy)
            .field("cache_policy", &self.cache_policy)
            .finish()
    }
}

/// Adapt a state-only action into the canonical two-argument capability.
pub fn action_from_state<F>(action: F) -> NodeAction
where
    F: Fn(Value) -> NodeFuture + Send + Sync + 'static,
{
    Arc::new(move |state, _config| action(state))
}

/// Adapt a zero-argument action into the canonical capability.
pub fn action_from_nullary<F>(action: F) -> NodeAction
where
    F: Fn() -> NodeFuture + Send + Sync + 'static,
{
    Arc::new(move |_state, _config| action())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_result_conversions() {
        assert!(matches!(
            NodeResult::from(json!({"a": 1})),
            NodeResult::Update(_)
        ));
        assert!(matches!(
            NodeResult::from(Command::new()),
            NodeResult::Command(_)
        ));
        assert!(matches!(
            NodeResult::from(SendTask::new("w", json!({}))),
            NodeResult::Send(_)
        ));
        assert!(matches!(
            NodeResult::from(vec![NodeResult::empty()]),
            NodeResult::Many(_)
        ));
    }

    #[tokio::test]
    async fn adapters_ignore_missing_arguments() {
        let state_only = action_from_state(|state| {
            Box::pin(async move { Ok(NodeResult::Update(state)) })
        });
        let out = state_only(json!({"x": 1}), RunConfig::new()).await.unwrap();
        assert!(matches!(out, NodeResult::Update(v) if v == json!({"x": 1})));

        let nullary = action_from_nullary(|| {
            Box::pin(async move { Ok(NodeResult::Update(json!({"ran": true}))) })
        });
        let out = nullary(json!({"ignored": 1}), RunConfig::new()).await.unwrap();
        assert!(matches!(out, NodeResult::Update(v) if v == json!({"ran": true})));
    }

    #[test]
    fn node_spec_builder() {
        let spec = NodeSpec::new(
            "worker",
            action_from_state(|s| Box::pin(async move { Ok(s.into()) })),
        )
        .with_metadata("role", json!("fan-out"))
        .with_retry_policy(RetryPolicy::new(2))
        .with_cache_policy(CachePolicy::new());

        assert_eq!(spec.name, "worker");
        assert_eq!(spec.metadata["role"], json!("fan-out"));
        assert!(spec.retry_policy.is_some());
        assert!(spec.cache_policy.is_some());
    }
}
