//! The seam between the sampling loop and the capabilities that act on the computer.
//!
//! The loop only knows the [`ToolDispatcher`] trait. [`ToolCollection`] is the usual
//! implementation: it declares the manifest of a [`ToolVersion`] and forwards each call to
//! the [`ToolHandler`] registered for that tool.
use async_trait::async_trait;
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

use crate::errors::AgentResult;
use crate::models::tool::{Tool, ToolResult};

pub mod collection;
pub mod groups;

pub use collection::ToolCollection;
pub use groups::{DisplayConfig, ToolGroup, ToolKind, ToolVersion};

/// An external capability provider, e.g. the process that injects mouse events
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool. Errors are reported back to the model, they never end the loop.
    async fn call(&self, input: Value) -> AgentResult<ToolResult>;
}

/// Maps tool names to capabilities and always answers with a result
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Declarations advertised to the model
    fn manifest(&self) -> &[Tool];

    /// Beta flag the endpoint needs to accept the manifest
    fn beta_flag(&self) -> Option<&str> {
        None
    }

    async fn run(&self, name: &str, input: Value) -> ToolResult;
}
