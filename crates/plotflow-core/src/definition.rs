//! Pipeline definition files.
//!
//! A definition file is a JSON document listing node declarations, for
//! pipelines described outside Rust code:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": 1, "label": "Start Data Ingest" },
//!     { "id": 2, "name": "clean_data", "connect": [1], "meta": { "owner": "etl" } }
//!   ]
//! }
//! ```
//!
//! `name` stands in for the implementation name: it is used for the label
//! when `label` is absent.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::{NodeDeclaration, StepHandle};
use crate::registry::Registry;
use crate::value::Metadata;

/// Errors from loading or applying a definition file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file could not be read.
    #[error("failed to read definition file: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not a valid pipeline definition.
    #[error("invalid pipeline definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// A declaration was rejected by the registry.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// One node entry of a definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connect: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub meta: Metadata,
}

impl NodeSpec {
    /// Converts the entry into a declaration. The handle carries the
    /// declared name only; definition files have no implementation.
    pub fn to_declaration(&self) -> NodeDeclaration {
        let handle = match &self.name {
            Some(name) => StepHandle::name_only(name.clone()),
            None => StepHandle::anonymous(),
        };
        NodeDeclaration::new(
            self.id,
            self.label.clone(),
            self.connect.iter().copied(),
            self.meta.clone(),
            handle,
        )
    }
}

/// A parsed pipeline definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    pub nodes: Vec<NodeSpec>,
}

impl PipelineDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading pipeline definition");
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Registers every node in file order, stopping at the first rejected
    /// declaration. Nodes registered before the failure stay registered.
    pub fn register_into(&self, registry: &Registry) -> Result<(), DefinitionError> {
        for spec in &self.nodes {
            registry.register(spec.to_declaration())?;
        }
        Ok(())
    }

    /// Registers into a fresh registry and returns it.
    pub fn to_registry(&self) -> Result<Registry, DefinitionError> {
        let registry = Registry::new();
        self.register_into(&registry)?;
        Ok(registry)
    }
}
