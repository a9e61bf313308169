use async_trait::async_trait;
use log::info;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{ToolContext, ToolDefinition, ToolResult};

/// A tool the engine can invoke on behalf of a caller.
///
/// Implementations must be stateless across calls; anything request-scoped
/// arrives through the arguments, anything shared through the context.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static descriptor advertised to callers and to the reasoning prompt.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with validated arguments.
    async fn execute(&self, arguments: Value, context: &ToolContext) -> ToolResult;

    fn name(&self) -> String {
        self.definition().name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    DuplicateTool(String),
    UnknownTool(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateTool(name) => {
                write!(f, "tool '{}' is already registered", name)
            }
            RegistryError::UnknownTool(name) => write!(f, "tool '{}' not found", name),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Holds every tool the engine exposes. Registration happens once at startup;
/// lookups and listings are concurrent after that.
///
/// `list()` returns descriptors in registration order, and that order is
/// stable for the life of the process so callers and prompts always see the
/// same catalogue.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    order: RwLock<Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Add a tool under its definition name. Names are unique; a second
    /// registration under the same name is rejected and the original stays.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name();
        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        tools.insert(name.clone(), tool);
        self.order.write().push(name.clone());
        info!("[REGISTRY] Registered tool: {}", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Descriptor for a single tool.
    pub fn describe(&self, name: &str) -> Result<ToolDefinition, RegistryError> {
        self.get(name)
            .map(|tool| tool.definition())
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// All descriptors, in registration order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read();
        self.order
            .read()
            .iter()
            .filter_map(|name| tools.get(name).map(|tool| tool.definition()))
            .collect()
    }

    /// Catalogue text rendered verbatim into the reasoning prompt.
    pub fn catalogue(&self) -> String {
        self.list()
            .iter()
            .map(|def| def.catalogue_entry())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
