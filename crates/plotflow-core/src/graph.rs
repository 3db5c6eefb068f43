//! Graph construction and validation.
//!
//! [`build_graph`] turns a registry [`Snapshot`] into a [`VerifiedGraph`]: one
//! node per declaration, one edge `dependency -> dependent` per declared
//! dependency. It fails if the snapshot is empty, if any dependency names an
//! undeclared id, or if the edges form a cycle. There is no partial success:
//! on failure the caller only gets the diagnostic.
//!
//! # Determinism
//!
//! Given the same snapshot, the build always yields the same node set, the
//! same edge set, and (on failure) the same diagnostic:
//! - declarations are visited in ascending id order, dependencies in declared
//!   order, so the first dangling reference reported is stable;
//! - the reported cycle starts at the smallest id lying on any cycle and
//!   follows the shortest path back, preferring smaller successors.

use std::collections::{BTreeSet, HashMap, VecDeque};

use indexmap::IndexMap;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;
use crate::id::NodeId;
use crate::registry::Snapshot;
use crate::value::Metadata;

/// A node of the verified graph, as plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// A directed edge from a dependency (`source`) to its dependent (`target`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

/// Serializable form of a [`VerifiedGraph`]: nodes in ascending id order,
/// edges in ascending `(source, target)` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}

/// A dependency graph that has passed referential-integrity and acyclicity
/// checks. Only [`build_graph`] constructs one.
#[derive(Debug, Clone)]
pub struct VerifiedGraph {
    /// Nodes in ascending id order.
    nodes: IndexMap<NodeId, GraphNode>,
    /// Edges run from dependency to dependent.
    graph: DiGraphMap<NodeId, ()>,
}

/// Builds and validates the dependency graph of `snapshot`.
///
/// # Errors
///
/// - [`CoreError::EmptyRegistry`] if the snapshot holds no declarations.
/// - [`CoreError::DanglingReference`] for the first dependency that names an
///   undeclared id. Always reported in preference to a cycle.
/// - [`CoreError::CycleDetected`] with one concrete cycle.
pub fn build_graph(snapshot: &Snapshot) -> Result<VerifiedGraph, CoreError> {
    if snapshot.is_empty() {
        tracing::warn!("graph build attempted on an empty registry");
        return Err(CoreError::EmptyRegistry);
    }

    let mut graph = DiGraphMap::with_capacity(snapshot.len(), snapshot.len());
    let mut nodes = IndexMap::with_capacity(snapshot.len());
    for decl in snapshot.iter() {
        graph.add_node(decl.id);
        nodes.insert(
            decl.id,
            GraphNode {
                id: decl.id,
                label: decl.label.clone(),
                metadata: decl.metadata.clone(),
            },
        );
    }

    for decl in snapshot.iter() {
        for &source in &decl.dependencies {
            if !snapshot.contains(source) {
                tracing::warn!(
                    dependent = %decl.id,
                    missing = %source,
                    "dependency on undeclared node"
                );
                return Err(CoreError::DanglingReference {
                    dependent: decl.id,
                    label: decl.label.clone(),
                    missing: source,
                });
            }
            graph.add_edge(source, decl.id, ());
        }
    }

    if let Some(cycle) = find_cycle(&graph) {
        tracing::warn!(?cycle, "dependency cycle in pipeline");
        return Err(CoreError::CycleDetected { cycle });
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built verified pipeline graph"
    );
    Ok(VerifiedGraph { nodes, graph })
}

/// Returns one cycle of `graph`, or `None` if it is acyclic.
fn find_cycle(graph: &DiGraphMap<NodeId, ()>) -> Option<Vec<NodeId>> {
    if !is_cyclic_directed(graph) {
        return None;
    }

    // A node lies on a cycle iff its strongly connected component has more
    // than one member or it has a self-loop.
    let start = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .min()?;

    shortest_cycle_through(graph, start)
}

/// Breadth-first search from `start` back to itself, expanding successors in
/// ascending id order.
fn shortest_cycle_through(graph: &DiGraphMap<NodeId, ()>, start: NodeId) -> Option<Vec<NodeId>> {
    let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        for next in sorted_neighbors(graph, current, Direction::Outgoing) {
            if next == start {
                let mut path = vec![current];
                let mut cursor = current;
                while cursor != start {
                    cursor = parent[&cursor];
                    path.push(cursor);
                }
                path.reverse();
                return Some(path);
            }
            if !parent.contains_key(&next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}

fn sorted_neighbors(graph: &DiGraphMap<NodeId, ()>, id: NodeId, dir: Direction) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = graph.neighbors_directed(id, dir).collect();
    out.sort_unstable();
    out
}

impl VerifiedGraph {
    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.nodes.values()
    }

    /// Edges in ascending `(source, target)` order.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .all_edges()
            .map(|(source, target, _)| Edge { source, target })
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn contains_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.graph.contains_edge(source, target)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.label.as_str())
    }

    /// Direct dependencies of `id`, ascending.
    pub fn dependencies_of(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        self.require(id)?;
        Ok(sorted_neighbors(&self.graph, id, Direction::Incoming))
    }

    /// Direct dependents of `id`, ascending.
    pub fn dependents_of(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        self.require(id)?;
        Ok(sorted_neighbors(&self.graph, id, Direction::Outgoing))
    }

    /// Nodes with no dependencies, ascending.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|&id| {
                self.graph
                    .neighbors_directed(id, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Nodes nothing depends on, ascending.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|&id| {
                self.graph
                    .neighbors_directed(id, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// A topological order: every dependency precedes its dependents. Among
    /// nodes that are ready at the same time, the smallest id goes first.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<NodeId, usize> = self
            .nodes
            .keys()
            .map(|&id| {
                (
                    id,
                    self.graph.neighbors_directed(id, Direction::Incoming).count(),
                )
            })
            .collect();
        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for next in self.graph.neighbors_directed(id, Direction::Outgoing) {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(next);
                    }
                }
            }
        }
        order
    }

    /// Groups nodes into layers by longest path from a root: layer 0 holds
    /// the roots, and every node sits one layer below its deepest
    /// dependency. Each layer is sorted ascending.
    pub fn layers(&self) -> Vec<Vec<NodeId>> {
        let mut depth: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        let mut layers: Vec<Vec<NodeId>> = Vec::new();

        for id in self.topological_order() {
            let d = self
                .graph
                .neighbors_directed(id, Direction::Incoming)
                .filter_map(|dep| depth.get(&dep))
                .map(|&dep_depth| dep_depth + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id, d);
            if layers.len() <= d {
                layers.resize_with(d + 1, Vec::new);
            }
            layers[d].push(id);
        }

        for layer in &mut layers {
            layer.sort_unstable();
        }
        layers
    }

    /// Content digest of the graph; see [`crate::hash::fingerprint`].
    pub fn fingerprint(&self) -> blake3::Hash {
        crate::hash::fingerprint(self)
    }

    /// Plain-data copy of the graph for renderers and serialization.
    pub fn to_data(&self) -> GraphData {
        GraphData {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges(),
        }
    }

    fn require(&self, id: NodeId) -> Result<(), CoreError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(CoreError::NodeNotFound { id })
        }
    }
}

impl Serialize for VerifiedGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_data().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDeclaration, StepHandle};
    use crate::value::MetaValue;

    fn decl(id: i64, deps: &[i64]) -> NodeDeclaration {
        NodeDeclaration::new(
            NodeId(id),
            None,
            deps.iter().copied().map(NodeId),
            Metadata::new(),
            StepHandle::anonymous(),
        )
    }

    fn snapshot(decls: Vec<NodeDeclaration>) -> Snapshot {
        decls.into_iter().collect()
    }

    fn ids(raw: &[i64]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        let err = build_graph(&Snapshot::default()).unwrap_err();
        assert_eq!(err, CoreError::EmptyRegistry);
    }

    #[test]
    fn single_node_without_edges() {
        let graph = build_graph(&snapshot(vec![decl(1, &[])])).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.label(NodeId(1)), Some("1"));
        assert_eq!(graph.roots(), ids(&[1]));
        assert_eq!(graph.sinks(), ids(&[1]));
    }

    #[test]
    fn edges_run_from_dependency_to_dependent() {
        let graph = build_graph(&snapshot(vec![decl(1, &[]), decl(2, &[1])])).unwrap();
        assert_eq!(
            graph.edges(),
            vec![Edge {
                source: NodeId(1),
                target: NodeId(2)
            }]
        );
        assert!(graph.contains_edge(NodeId(1), NodeId(2)));
        assert!(!graph.contains_edge(NodeId(2), NodeId(1)));
    }

    #[test]
    fn dangling_reference_names_dependent_and_missing() {
        let snap = snapshot(vec![decl(1, &[]), decl(2, &[1]), decl(3, &[99])]);
        let err = build_graph(&snap).unwrap_err();
        assert_eq!(
            err,
            CoreError::DanglingReference {
                dependent: NodeId(3),
                label: "3".into(),
                missing: NodeId(99),
            }
        );
    }

    #[test]
    fn dangling_reference_reported_before_cycle() {
        // 1 <-> 2 is a cycle, but 2 also points at a missing node.
        let snap = snapshot(vec![decl(1, &[2]), decl(2, &[1, 50])]);
        let err = build_graph(&snap).unwrap_err();
        assert!(matches!(
            err,
            CoreError::DanglingReference {
                missing: NodeId(50),
                ..
            }
        ));
    }

    #[test]
    fn two_node_cycle_starts_at_smaller_id() {
        let snap = snapshot(vec![decl(1, &[2]), decl(2, &[1])]);
        let err = build_graph(&snap).unwrap_err();
        assert_eq!(err, CoreError::CycleDetected { cycle: ids(&[1, 2]) });
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let snap = snapshot(vec![decl(1, &[]), decl(4, &[4, 1])]);
        let err = build_graph(&snap).unwrap_err();
        assert_eq!(err, CoreError::CycleDetected { cycle: ids(&[4]) });
    }

    #[test]
    fn cycle_follows_dependency_edges() {
        // Edges: 3 -> 5, 5 -> 7, 7 -> 3, plus an acyclic tail 1 -> 3.
        let snap = snapshot(vec![
            decl(1, &[]),
            decl(3, &[1, 7]),
            decl(5, &[3]),
            decl(7, &[5]),
        ]);
        let err = build_graph(&snap).unwrap_err();
        assert_eq!(err, CoreError::CycleDetected { cycle: ids(&[3, 5, 7]) });
    }

    #[test]
    fn cycle_representative_is_shortest_and_deterministic() {
        // Two cycles through 1: 1 -> 2 -> 3 -> 1 and 1 -> 4 -> 1.
        let snap = snapshot(vec![
            decl(1, &[3, 4]),
            decl(2, &[1]),
            decl(3, &[2]),
            decl(4, &[1]),
        ]);
        let first = build_graph(&snap).unwrap_err();
        let second = build_graph(&snap).unwrap_err();
        assert_eq!(first, CoreError::CycleDetected { cycle: ids(&[1, 4]) });
        assert_eq!(first, second);
    }

    #[test]
    fn smallest_cyclic_node_is_chosen_even_if_not_smallest_overall() {
        let snap = snapshot(vec![
            decl(1, &[]),
            decl(2, &[1]),
            decl(8, &[9]),
            decl(9, &[8, 2]),
        ]);
        let err = build_graph(&snap).unwrap_err();
        assert_eq!(err, CoreError::CycleDetected { cycle: ids(&[8, 9]) });
    }

    #[test]
    fn duplicate_dependencies_collapse_into_one_edge() {
        let graph = build_graph(&snapshot(vec![decl(1, &[]), decl(2, &[1, 1])])).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn neighbour_queries() {
        let graph = build_graph(&snapshot(vec![
            decl(1, &[]),
            decl(2, &[1]),
            decl(3, &[1]),
            decl(4, &[3, 2]),
        ]))
        .unwrap();

        assert_eq!(graph.dependencies_of(NodeId(4)).unwrap(), ids(&[2, 3]));
        assert_eq!(graph.dependents_of(NodeId(1)).unwrap(), ids(&[2, 3]));
        assert_eq!(
            graph.dependencies_of(NodeId(42)).unwrap_err(),
            CoreError::NodeNotFound { id: NodeId(42) }
        );
        assert_eq!(graph.roots(), ids(&[1]));
        assert_eq!(graph.sinks(), ids(&[4]));
    }

    #[test]
    fn topological_order_prefers_smaller_ready_ids() {
        let graph = build_graph(&snapshot(vec![
            decl(10, &[]),
            decl(2, &[10]),
            decl(5, &[]),
            decl(1, &[5]),
        ]))
        .unwrap();
        assert_eq!(graph.topological_order(), ids(&[5, 1, 10, 2]));
    }

    #[test]
    fn layers_use_longest_path() {
        // 1 -> 2 -> 3 and 1 -> 3: node 3 sits below 2, not beside it.
        let graph = build_graph(&snapshot(vec![
            decl(1, &[]),
            decl(2, &[1]),
            decl(3, &[1, 2]),
            decl(4, &[]),
        ]))
        .unwrap();
        assert_eq!(
            graph.layers(),
            vec![ids(&[1, 4]), ids(&[2]), ids(&[3])]
        );
    }

    #[test]
    fn serializes_as_plain_data() {
        let graph = build_graph(&snapshot(vec![decl(1, &[]), decl(2, &[1])])).unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "nodes": [
                    {"id": 1, "label": "1"},
                    {"id": 2, "label": "2"}
                ],
                "edges": [
                    {"source": 1, "target": 2}
                ]
            })
        );
        let data: GraphData = serde_json::from_value(json).unwrap();
        assert_eq!(data, graph.to_data());
    }

    #[test]
    fn export_shape_with_metadata() {
        let mut meta = Metadata::new();
        meta.insert("owner".into(), MetaValue::from("ops"));
        meta.insert("retries".into(), MetaValue::from(3));
        let graph = build_graph(&snapshot(vec![
            NodeDeclaration::new(
                NodeId(1),
                Some("Load".into()),
                [],
                meta,
                StepHandle::anonymous(),
            ),
            decl(2, &[1]),
        ]))
        .unwrap();

        insta::assert_json_snapshot!(graph, @r#"
        {
          "nodes": [
            {
              "id": 1,
              "label": "Load",
              "metadata": {
                "owner": "ops",
                "retries": 3
              }
            },
            {
              "id": 2,
              "label": "2"
            }
          ],
          "edges": [
            {
              "source": 1,
              "target": 2
            }
          ]
        }
        "#);
    }
}
