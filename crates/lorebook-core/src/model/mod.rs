pub mod context_type;
pub mod entry;
pub mod node;
pub mod project;
pub mod timestamp;
pub mod views;

pub use context_type::ContextType;
pub use entry::{ContentInput, Entry};
pub use node::{truncate_chars, ContextNode, Metadata, DEFAULT_PROJECT};
pub use project::Project;
pub use views::{NodeSummary, PathSegment, TreeNode};
