//! Deterministic content fingerprint of a verified graph using blake3.
//!
//! Two graphs with the same nodes (id + label) and the same edges always
//! produce the same digest, whatever order the registry was populated in.
//! Metadata is not part of the fingerprint: it is opaque to validation.
//!
//! Layout of the hashed stream:
//! - node count, then per node in ascending id order: id, label length,
//!   label bytes;
//! - edge count, then per edge in ascending `(source, target)` order: source,
//!   target.
//!
//! All integers are little-endian `u64`/`i64`, so labels cannot bleed into
//! neighbouring fields.

use crate::graph::VerifiedGraph;

/// Computes the blake3 fingerprint of `graph`.
pub fn fingerprint(graph: &VerifiedGraph) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();

    hasher.update(&(graph.node_count() as u64).to_le_bytes());
    for node in graph.nodes() {
        hasher.update(&node.id.0.to_le_bytes());
        hasher.update(&(node.label.len() as u64).to_le_bytes());
        hasher.update(node.label.as_bytes());
    }

    let edges = graph.edges();
    hasher.update(&(edges.len() as u64).to_le_bytes());
    for edge in &edges {
        hasher.update(&edge.source.0.to_le_bytes());
        hasher.update(&edge.target.0.to_le_bytes());
    }

    hasher.finalize()
}
