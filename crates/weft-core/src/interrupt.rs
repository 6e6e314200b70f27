//! Interrupts: orderly, resumable pauses
//!
//! An [`Interrupt`] is the payload of a `GraphError::Interrupt` pause. The
//! engine checkpoints the state *before* the error surfaces, so a caller
//! resumes by invoking again with null input and the same thread config.
//!
//! Interrupt points are declared at compile time as `interrupt_before` /
//! `interrupt_after` node lists; either may be the wildcard `"*"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wildcard matching every node in an interrupt list
pub const INTERRUPT_WILDCARD: &str = "*";

/// Payload of one pause
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interrupt {
    /// What the pause is about, surfaced to the caller
    pub value: Value,

    /// Identity of this interrupt; fresh 128-bit random hex by default
    pub id: String,
}

impl Interrupt {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            id: fresh_id(),
        }
    }

    pub fn with_id(value: Value, id: impl Into<String>) -> Self {
        Self {
            value,
            id: id.into(),
        }
    }
}

fn fresh_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Whether `node` is covered by an interrupt list (exact match or wildcard).
pub fn interrupt_matches(nodes: &[String], node: &str) -> bool {
    nodes
        .iter()
        .any(|n| n == node || n == INTERRUPT_WILDCARD)
}
