use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failures raised by tool handlers. These never abort the loop, they are
/// folded into an error `ToolResult` so the model can react to them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures talking to the model endpoint
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: Value },

    #[error("Invalid response from endpoint: {0}")]
    InvalidResponse(String),

    #[error("Endpoint configuration error: {0}")]
    Config(String),
}

impl EndpointError {
    /// Whether another attempt at the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            EndpointError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            EndpointError::Status { status, .. } => {
                matches!(status, 408 | 409 | 429) || *status >= 500
            }
            EndpointError::InvalidResponse(_) | EndpointError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_retryability() {
        let retryable = [408, 409, 429, 500, 529];
        for status in retryable {
            let err = EndpointError::Status {
                status,
                body: json!({}),
            };
            assert!(err.is_retryable(), "{} should be retried", status);
        }

        let err = EndpointError::Status {
            status: 400,
            body: json!({"type": "error"}),
        };
        assert!(!err.is_retryable());
        assert!(!EndpointError::InvalidResponse("bad".into()).is_retryable());
    }

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::ExecutionError("xdotool exited with 1".to_string());
        assert_eq!(err.to_string(), "Tool execution failed: xdotool exited with 1");
    }
}
