//! Builder-style registration front-end.
//!
//! [`Pipeline`] collects the parameters of one pipeline step (id, optional
//! label, dependencies, metadata), then registers the step in a
//! [`Registry`] and hands the step back unchanged:
//!
//! ```
//! use plotflow_core::{Pipeline, Registry};
//!
//! fn load_data() -> Vec<u8> { Vec::new() }
//! fn clean_data() {}
//!
//! let registry = Registry::new();
//! let load = Pipeline::new(1).register(&registry, load_data).unwrap();
//! Pipeline::new(2).connect([1]).register(&registry, clean_data).unwrap();
//!
//! assert!(load().is_empty());
//! let graph = registry.build().unwrap();
//! assert_eq!(graph.label(1.into()), Some("Load Data"));
//! ```

use std::any::Any;

use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::{NodeDeclaration, StepHandle};
use crate::registry::Registry;
use crate::value::{MetaValue, Metadata};

/// Declaration builder for a single pipeline step.
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: NodeId,
    label: Option<String>,
    connect: Vec<NodeId>,
    meta: Metadata,
}

impl Pipeline {
    /// Starts a declaration for the step with the given id.
    pub fn new(id: impl Into<NodeId>) -> Self {
        Pipeline {
            id: id.into(),
            label: None,
            connect: Vec::new(),
            meta: Metadata::new(),
        }
    }

    /// Sets an explicit display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds dependencies: ids of the steps whose output this step consumes.
    pub fn connect<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NodeId>,
    {
        self.connect.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Adds a metadata entry. A repeated key overwrites the earlier value.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Finishes the declaration around an existing handle.
    pub fn declare(self, handle: StepHandle) -> NodeDeclaration {
        NodeDeclaration::new(self.id, self.label, self.connect, self.meta, handle)
    }

    /// Registers `step` and returns it unchanged. The step's implementation
    /// name is taken from its type (see [`StepHandle::new`]).
    pub fn register<F>(self, registry: &Registry, step: F) -> Result<F, CoreError>
    where
        F: Any + Send + Sync + Clone,
    {
        registry.register(self.declare(StepHandle::new(step.clone())))?;
        Ok(step)
    }

    /// Like [`register`](Self::register) with an explicit implementation name.
    pub fn register_named<F>(
        self,
        registry: &Registry,
        name: &str,
        step: F,
    ) -> Result<F, CoreError>
    where
        F: Any + Send + Sync + Clone,
    {
        registry.register(self.declare(StepHandle::named(name, step.clone())))?;
        Ok(step)
    }
}
