use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::groups::{DisplayConfig, ToolGroup, ToolKind, ToolVersion};
use super::{ToolDispatcher, ToolHandler};
use crate::models::tool::{Tool, ToolResult};

/// The tools of one version plus the handlers that carry them out
pub struct ToolCollection {
    group: ToolGroup,
    manifest: Vec<Tool>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolCollection {
    pub fn from_version(version: ToolVersion, display: &DisplayConfig) -> Self {
        let group = ToolGroup::new(version, display);
        let manifest = group.tools.iter().map(|(_, tool)| tool.clone()).collect();
        Self {
            group,
            manifest,
            handlers: HashMap::new(),
        }
    }

    pub fn version(&self) -> ToolVersion {
        self.group.version
    }

    /// Name the model uses for `kind` in this version
    pub fn name_of(&self, kind: ToolKind) -> Option<&str> {
        self.group.name_of(kind)
    }

    /// Route calls for one of the group's tools to `handler`
    pub fn with_handler(mut self, kind: ToolKind, handler: Arc<dyn ToolHandler>) -> Self {
        if let Some(name) = self.group.name_of(kind) {
            self.handlers.insert(name.to_string(), handler);
        }
        self
    }

    /// Declare an extra schema tool next to the computer use ones
    pub fn with_custom_tool(mut self, tool: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        let name = tool.name().to_string();
        self.manifest.retain(|existing| existing.name() != name);
        self.manifest.push(tool);
        self.handlers.insert(name, handler);
        self
    }

    fn is_declared(&self, name: &str) -> bool {
        self.manifest.iter().any(|tool| tool.name() == name)
    }
}

#[async_trait]
impl ToolDispatcher for ToolCollection {
    fn manifest(&self) -> &[Tool] {
        &self.manifest
    }

    fn beta_flag(&self) -> Option<&str> {
        self.group.beta_flag
    }

    async fn run(&self, name: &str, input: Value) -> ToolResult {
        if !self.is_declared(name) {
            warn!(tool = name, "model called an undeclared tool");
            return ToolResult::error(format!("Tool {} is invalid", name));
        }

        let Some(handler) = self.handlers.get(name) else {
            warn!(tool = name, "no handler registered");
            return ToolResult::error(format!("Tool {} is not available", name));
        };

        debug!(tool = name, input = %input, "running tool");
        match handler.call(input).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
