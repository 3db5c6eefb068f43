//! Node declarations and the opaque step handle they carry.
//!
//! A [`NodeDeclaration`] is the unit stored in the [`Registry`](crate::Registry):
//! one per pipeline step, created by a single registration and never mutated
//! afterwards. The step implementation itself travels as a [`StepHandle`],
//! which the core threads through without ever invoking.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::id::NodeId;
use crate::value::Metadata;

/// Declared predecessors of a node, in declaration order.
pub type Dependencies = SmallVec<[NodeId; 4]>;

/// Opaque reference to a step's implementation.
///
/// Holds the implementation behind `Arc<dyn Any>` so downstream consumers
/// (an execution engine, say) can downcast it back. The declared name feeds
/// label resolution when no explicit label is given.
#[derive(Clone, Default)]
pub struct StepHandle {
    name: Option<String>,
    step: Option<Arc<dyn Any + Send + Sync>>,
}

impl StepHandle {
    /// Wraps `step`, taking its declared name from the type name of `F`.
    ///
    /// For function items this is the function's own name (`load_rules` for
    /// `fn load_rules()`). Closures and other unnamed types yield no name.
    /// The name is best-effort: it relies on [`std::any::type_name`].
    pub fn new<F: Any + Send + Sync>(step: F) -> Self {
        StepHandle {
            name: declared_name::<F>(),
            step: Some(Arc::new(step)),
        }
    }

    /// Wraps `step` under an explicit implementation name.
    pub fn named<F: Any + Send + Sync>(name: impl Into<String>, step: F) -> Self {
        StepHandle {
            name: Some(name.into()),
            step: Some(Arc::new(step)),
        }
    }

    /// A handle with a name but no implementation attached, as produced by
    /// pipeline definition files.
    pub fn name_only(name: impl Into<String>) -> Self {
        StepHandle {
            name: Some(name.into()),
            step: None,
        }
    }

    /// A handle with neither name nor implementation.
    pub fn anonymous() -> Self {
        StepHandle::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn has_step(&self) -> bool {
        self.step.is_some()
    }

    /// Downcasts the wrapped implementation to `F`.
    pub fn downcast_ref<F: Any>(&self) -> Option<&F> {
        self.step.as_deref().and_then(|s| s.downcast_ref::<F>())
    }
}

impl fmt::Debug for StepHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepHandle")
            .field("name", &self.name)
            .field("has_step", &self.has_step())
            .finish()
    }
}

/// Handles compare by name and by identity of the wrapped implementation.
impl PartialEq for StepHandle {
    fn eq(&self, other: &Self) -> bool {
        let same_step = match (&self.step, &other.step) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_step && self.name == other.name
    }
}

/// Last path segment of `type_name::<F>()`, if it is a plain identifier.
fn declared_name<F>() -> Option<String> {
    let full = type_name::<F>();
    let last = full.rsplit("::").next()?;
    let is_ident = !last.is_empty()
        && last.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !last.starts_with(|c: char| c.is_ascii_digit());
    is_ident.then(|| last.to_string())
}

/// A single declared pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDeclaration {
    /// Unique key across the registry.
    pub id: NodeId,
    /// Display label, already resolved (see [`resolve_label`]).
    pub label: String,
    /// Ids of the nodes whose output this node consumes.
    pub dependencies: Dependencies,
    /// Opaque metadata, forwarded untouched.
    pub metadata: Metadata,
    /// The step implementation. Never invoked by the core.
    pub handle: StepHandle,
}

impl NodeDeclaration {
    /// Creates a declaration, resolving the label from `label`, the handle's
    /// declared name, or the id, in that order.
    pub fn new(
        id: NodeId,
        label: Option<String>,
        dependencies: impl IntoIterator<Item = NodeId>,
        metadata: Metadata,
        handle: StepHandle,
    ) -> Self {
        let label = resolve_label(label.as_deref(), handle.name(), id);
        NodeDeclaration {
            id,
            label,
            dependencies: dependencies.into_iter().collect(),
            metadata,
            handle,
        }
    }
}

/// Resolves a node's display label.
///
/// An explicit non-empty label wins. Otherwise the implementation name is
/// rendered with underscores as spaces and each word title-cased
/// (`clean_raw_data` becomes `Clean Raw Data`). If that is unavailable or
/// blank, the decimal id is used.
pub fn resolve_label(label: Option<&str>, name: Option<&str>, id: NodeId) -> String {
    if let Some(label) = label.filter(|l| !l.is_empty()) {
        return label.to_string();
    }
    name.map(|n| title_case(&n.replace('_', " ")))
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| id.to_string())
}

/// Uppercases the first letter of every alphabetic run and lowercases the
/// rest of the run.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_raw_data() {}

    #[test]
    fn explicit_label_wins() {
        assert_eq!(
            resolve_label(Some("Start Data Ingest"), Some("node_1"), NodeId(1)),
            "Start Data Ingest"
        );
    }

    #[test]
    fn label_derived_from_name() {
        assert_eq!(
            resolve_label(None, Some("clean_raw_data"), NodeId(2)),
            "Clean Raw Data"
        );
        assert_eq!(resolve_label(None, Some("node_1"), NodeId(1)), "Node 1");
        assert_eq!(resolve_label(None, Some("LOAD_rules"), NodeId(1)), "Load Rules");
        assert_eq!(resolve_label(None, Some("step2go"), NodeId(1)), "Step2Go");
    }

    #[test]
    fn empty_label_falls_through_to_name() {
        assert_eq!(resolve_label(Some(""), Some("aggregate"), NodeId(9)), "Aggregate");
    }

    #[test]
    fn label_falls_back_to_id() {
        assert_eq!(resolve_label(None, None, NodeId(42)), "42");
        assert_eq!(resolve_label(None, Some("___"), NodeId(-7)), "-7");
        assert_eq!(resolve_label(None, Some(""), NodeId(5)), "5");
    }

    #[test]
    fn handle_takes_name_from_function_item() {
        let handle = StepHandle::new(clean_raw_data);
        assert_eq!(handle.name(), Some("clean_raw_data"));
        assert!(handle.has_step());
    }

    #[test]
    fn closure_handle_has_no_name() {
        let handle = StepHandle::new(|| 1 + 1);
        assert_eq!(handle.name(), None);
        assert!(handle.has_step());
    }

    #[test]
    fn handle_downcasts_to_wrapped_step() {
        let handle = StepHandle::named("double", 21_u32);
        assert_eq!(handle.downcast_ref::<u32>(), Some(&21));
        assert_eq!(handle.downcast_ref::<i64>(), None);
        assert_eq!(StepHandle::anonymous().downcast_ref::<u32>(), None);
    }

    #[test]
    fn cloned_handles_are_equal() {
        let a = StepHandle::named("step", 1_u8);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, StepHandle::named("step", 1_u8));
        assert_eq!(StepHandle::name_only("x"), StepHandle::name_only("x"));
    }

    #[test]
    fn declaration_resolves_label_from_handle() {
        let decl = NodeDeclaration::new(
            NodeId(3),
            None,
            [NodeId(1)],
            Metadata::new(),
            StepHandle::name_only("transform_data"),
        );
        assert_eq!(decl.label, "Transform Data");
        assert_eq!(decl.dependencies.as_slice(), &[NodeId(1)]);
    }
}
