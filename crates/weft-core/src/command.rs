//! Command: a node-return envelope combining updates and routing
//!
//! A node that needs more than a plain state update returns a [`Command`]:
//! it can contribute an update, declare its own successors (node names or
//! [`Send`] dispatches), and carry a resume value for interrupted flows.
//! The `graph` field is reserved for subgraph handoff; the engine rejects a
//! non-nil value until those semantics exist.

use crate::send::Send;
use serde_json::Value;

/// One successor declared by a [`Command`]
#[derive(Debug, Clone)]
pub enum GotoTarget {
    /// Schedule a node for the next superstep
    Node(String),

    /// Dispatch an extra invocation within the current superstep
    Dispatch(Send),
}

impl From<&str> for GotoTarget {
    fn from(node: &str) -> Self {
        GotoTarget::Node(node.to_string())
    }
}

impl From<String> for GotoTarget {
    fn from(node: String) -> Self {
        GotoTarget::Node(node)
    }
}

impl From<Send> for GotoTarget {
    fn from(send: Send) -> Self {
        GotoTarget::Dispatch(send)
    }
}

/// Node-return envelope: state update plus successor declarations
#[derive(Debug, Clone, Default)]
pub struct Command {
    /// State update to contribute this superstep
    pub update: Option<Value>,

    /// Successors: nodes for the next superstep, Sends for this one
    pub goto: Vec<GotoTarget>,

    /// Value surfaced to interrupted-and-resumed flows
    pub resume: Option<Value>,

    /// Reserved for subgraph handoff; a non-nil value is rejected with
    /// `InvalidGraph`
    pub graph: Option<String>,
}

impl Command {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update(mut self, update: Value) -> Self {
        self.update = Some(update);
        self
    }

    pub fn with_goto(mut self, target: impl Into<GotoTarget>) -> Self {
        self.goto.push(target.into());
        self
    }

    pub fn with_goto_many<T: Into<GotoTarget>>(
        mut self,
        targets: impl IntoIterator<Item = T>,
    ) -> Self {
        self.goto.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn with_resume(mut self, resume: Value) -> Self {
        self.resume = Some(resume);
        self
    }

    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    /// Whether the command carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.update.is_none()
            && self.goto.is_empty()
            && self.resume.is_none()
            && self.graph.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_builder_collects_fields() {
        let cmd = Command::new()
            .with_update(json!({"status": "done"}))
            .with_goto("next")
            .with_goto(Send::new("worker", json!({"task": 1})))
            .with_resume(json!("approved"));

        assert_eq!(cmd.update, Some(json!({"status": "done"})));
        assert_eq!(cmd.goto.len(), 2);
        assert!(matches!(&cmd.goto[0], GotoTarget::Node(n) if n == "next"));
        assert!(matches!(&cmd.goto[1], GotoTarget::Dispatch(s) if s.node() == "worker"));
        assert_eq!(cmd.resume, Some(json!("approved")));
        assert!(cmd.graph.is_none());
    }

    #[test]
    fn empty_command_is_empty() {
        assert!(Command::new().is_empty());
        assert!(!Command::new().with_goto("a").is_empty());
    }

    #[test]
    fn goto_many_accepts_mixed_strings() {
        let cmd = Command::new().with_goto_many(vec!["a", "b"]);
        assert_eq!(cmd.goto.len(), 2);
    }
}
