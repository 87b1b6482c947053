pub mod edge;
pub mod error;
pub mod format;
pub mod graph;
pub mod id;
pub mod label;
pub mod node;
pub mod query;

// Re-export commonly used types
pub use edge::{DataEdge, InputPort};
pub use error::CoreError;
pub use format::FileFormat;
pub use graph::PipelineGraph;
pub use id::{EdgeId, NodeId};
pub use label::{sanitize_table_name, LabelAllocator};
pub use node::{FileRef, NodeKind, TableNode};
