//! The node registry: single source of truth for declared pipeline steps.
//!
//! [`Registry`] is an explicit value owned by the caller rather than hidden
//! process-wide state, so independent pipelines (and tests) can each hold
//! their own. Three operations matter: register one declaration, take a
//! [`Snapshot`], and clear everything. There is no way
//! to remove or replace a single node; redefining a node means clearing the
//! registry and declaring the pipeline again.

use std::collections::btree_map::{self, BTreeMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::CoreError;
use crate::graph::{build_graph, VerifiedGraph};
use crate::id::NodeId;
use crate::node::NodeDeclaration;

/// Keyed store of node declarations.
///
/// All access goes through one `RwLock`. Registration holds the write lock
/// across both the duplicate check and the insert, so concurrent callers can
/// never both claim the same id.
#[derive(Debug, Default)]
pub struct Registry {
    nodes: RwLock<BTreeMap<NodeId, NodeDeclaration>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Inserts a declaration.
    ///
    /// Returns [`CoreError::DuplicateId`] if the id is already present, in
    /// which case the registry is unchanged.
    pub fn register(&self, declaration: NodeDeclaration) -> Result<(), CoreError> {
        let mut nodes = self.write();
        match nodes.entry(declaration.id) {
            btree_map::Entry::Occupied(existing) => Err(CoreError::DuplicateId {
                id: declaration.id,
                existing_label: existing.get().label.clone(),
            }),
            btree_map::Entry::Vacant(slot) => {
                tracing::debug!(
                    id = %declaration.id,
                    label = %declaration.label,
                    dependencies = declaration.dependencies.len(),
                    "registered pipeline node"
                );
                slot.insert(declaration);
                Ok(())
            }
        }
    }

    /// Returns an independent copy of every current declaration.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.read().clone(),
        }
    }

    /// Removes every declaration. A cleared registry is indistinguishable
    /// from a new one.
    pub fn clear(&self) {
        let mut nodes = self.write();
        tracing::debug!(removed = nodes.len(), "cleared pipeline registry");
        nodes.clear();
    }

    /// Snapshots the registry and builds a verified graph from it.
    pub fn build(&self) -> Result<VerifiedGraph, CoreError> {
        build_graph(&self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.read().contains_key(&id)
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every mutation is a single insert or clear.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<NodeId, NodeDeclaration>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<NodeId, NodeDeclaration>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of the registry contents, iterated in ascending id
/// order regardless of registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    nodes: BTreeMap<NodeId, NodeDeclaration>,
}

impl Snapshot {
    pub fn get(&self, id: NodeId) -> Option<&NodeDeclaration> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declared ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Declarations in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeDeclaration> + '_ {
        self.nodes.values()
    }
}

impl FromIterator<NodeDeclaration> for Snapshot {
    /// Collects declarations into a snapshot. Later duplicates replace
    /// earlier ones; use a [`Registry`] when duplicates must be rejected.
    fn from_iter<I: IntoIterator<Item = NodeDeclaration>>(iter: I) -> Self {
        Snapshot {
            nodes: iter.into_iter().map(|d| (d.id, d)).collect(),
        }
    }
}
