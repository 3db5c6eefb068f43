//! Core error types for plotflow-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering every
//! way a registration or a graph build can be rejected. All of them are
//! caller-input errors; none is transient.

use std::fmt::Write as _;

use thiserror::Error;

use crate::id::NodeId;

/// Core errors produced by the plotflow-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Registration reused an id that is already present. The registry is
    /// left unchanged.
    #[error("node id {id} is already registered by '{existing_label}'")]
    DuplicateId { id: NodeId, existing_label: String },

    /// A graph build was attempted on a registry with no declarations.
    #[error("no pipeline nodes have been registered")]
    EmptyRegistry,

    /// A declared dependency names an id with no declaration.
    #[error("node {dependent} ('{label}') depends on non-existent node {missing}")]
    DanglingReference {
        dependent: NodeId,
        label: String,
        missing: NodeId,
    },

    /// The dependency graph contains a cycle. `cycle` starts at the smallest
    /// id on the cycle and follows dependency edges; the start is not
    /// repeated at the end.
    #[error("cycle detected in pipeline: {}", render_cycle(.cycle))]
    CycleDetected { cycle: Vec<NodeId> },

    /// A graph query named an id that is not in the graph.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },
}

fn render_cycle(cycle: &[NodeId]) -> String {
    let mut out = String::new();
    for id in cycle {
        let _ = write!(out, "{id} -> ");
    }
    match cycle.first() {
        Some(first) => {
            let _ = write!(out, "{first}");
        }
        None => out.push_str("<empty>"),
    }
    out
}
