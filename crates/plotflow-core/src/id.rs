//! Node identifier newtype.
//!
//! Pipeline steps are keyed by a caller-chosen integer. [`NodeId`] wraps it so
//! an id cannot be confused with a count or an index into some other table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-supplied identifier of a pipeline step.
///
/// Ids are never auto-assigned. Ordering is numeric, which is the order used
/// whenever the graph builder needs a deterministic "smallest" node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(raw: i64) -> Self {
        NodeId(raw)
    }
}

impl From<i32> for NodeId {
    fn from(raw: i32) -> Self {
        NodeId(i64::from(raw))
    }
}

impl From<NodeId> for i64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId(7)), "7");
        assert_eq!(format!("{}", NodeId(-3)), "-3");
    }

    #[test]
    fn node_ids_order_numerically() {
        let mut ids = vec![NodeId(10), NodeId(2), NodeId(-1), NodeId(9)];
        ids.sort();
        assert_eq!(ids, vec![NodeId(-1), NodeId(2), NodeId(9), NodeId(10)]);
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&NodeId(42)).unwrap();
        assert_eq!(json, "42");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeId(42));
    }
}
