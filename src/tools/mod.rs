pub mod builtin;
pub mod registry;
pub mod schema;
pub mod types;

pub use registry::{RegistryError, Tool, ToolRegistry};
pub use types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult, ToolStatus,
};
