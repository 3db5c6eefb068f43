pub mod declare;
pub mod definition;
pub mod dot;
pub mod error;
pub mod graph;
pub mod hash;
pub mod id;
pub mod node;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use declare::Pipeline;
pub use definition::{DefinitionError, PipelineDefinition};
pub use dot::{to_dot, DotOptions, Orientation};
pub use error::CoreError;
pub use graph::{build_graph, Edge, GraphData, GraphNode, VerifiedGraph};
pub use id::NodeId;
pub use node::{NodeDeclaration, StepHandle};
pub use registry::{Registry, Snapshot};
pub use value::{MetaValue, Metadata};
