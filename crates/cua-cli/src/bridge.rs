use async_trait::async_trait;
use cua::errors::{AgentError, AgentResult};
use cua::models::tool::ToolResult;
use cua::tools::{ToolCollection, ToolHandler, ToolKind};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs a tool call through an external executable.
///
/// The executable gets the tool name as its only argument and the input as JSON on stdin,
/// and prints a `ToolResult` as JSON on stdout.
pub struct CommandToolHandler {
    program: PathBuf,
    tool: String,
}

impl CommandToolHandler {
    pub fn new<S: Into<String>>(program: PathBuf, tool: S) -> Self {
        Self {
            program,
            tool: tool.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for CommandToolHandler {
    async fn call(&self, input: Value) -> AgentResult<ToolResult> {
        let mut child = Command::new(&self.program)
            .arg(&self.tool)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgentError::ExecutionError(format!(
                    "Failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&input)
                .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::ExecutionError(stderr.trim().to_string()));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            AgentError::Internal(format!("{} printed an invalid result: {}", self.tool, e))
        })
    }
}

/// Attach the bridge to every tool of the collection
pub fn with_bridge(tools: ToolCollection, program: PathBuf) -> ToolCollection {
    let mut tools = tools;
    for kind in ToolKind::iter() {
        let Some(name) = tools.name_of(kind).map(str::to_string) else {
            continue;
        };
        let handler = Arc::new(CommandToolHandler::new(program.clone(), name));
        tools = tools.with_handler(kind, handler);
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use cua::tools::{DisplayConfig, ToolDispatcher, ToolVersion};
    use serde_json::json;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("bridge.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    #[serial]
    async fn test_bridge_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let received = dir.path().join("input.json");
        let program = script(
            &dir,
            &format!(
                "cat > {}\nprintf '{{\"output\": \"ran %s\"}}' \"$1\"",
                received.display()
            ),
        );

        let handler = CommandToolHandler::new(program, "bash");
        let result = handler.call(json!({"command": "ls"})).await.unwrap();

        assert_eq!(result, ToolResult::output("ran bash"));
        let input: Value = serde_json::from_str(&fs::read_to_string(&received).unwrap()).unwrap();
        assert_eq!(input, json!({"command": "ls"}));
    }

    #[tokio::test]
    #[serial]
    async fn test_bridge_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "cat > /dev/null\necho 'no display' >&2\nexit 3");

        let handler = CommandToolHandler::new(program, "computer");
        let error = handler.call(json!({})).await.unwrap_err();
        assert_eq!(error, AgentError::ExecutionError("no display".to_string()));
    }

    #[tokio::test]
    #[serial]
    async fn test_bridge_garbage_output() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "cat > /dev/null\necho 'not json'");

        let handler = CommandToolHandler::new(program, "computer");
        assert!(matches!(
            handler.call(json!({})).await,
            Err(AgentError::Internal(_))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_with_bridge_routes_every_tool() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "cat > /dev/null\nprintf '{\"output\": \"%s\"}' \"$1\"");

        let tools = with_bridge(
            ToolCollection::from_version(
                ToolVersion::ComputerUse20250429,
                &DisplayConfig::default(),
            ),
            program,
        );

        for name in ["computer", "bash", "str_replace_based_edit_tool"] {
            assert_eq!(tools.run(name, json!({})).await, ToolResult::output(name));
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let handler = CommandToolHandler::new(PathBuf::from("/nonexistent/cua-bridge"), "bash");
        assert!(matches!(
            handler.call(json!({})).await,
            Err(AgentError::ExecutionError(_))
        ));
    }
}
