use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EndpointError;
use crate::history::CacheBreakpoints;
use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub cache_creation_input_tokens: Option<i32>,
    pub cache_read_input_tokens: Option<i32>,
}

impl Usage {
    pub fn new(input_tokens: Option<i32>, output_tokens: Option<i32>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }
}

/// Everything a backend needs to build one messages call
#[derive(Debug, Clone, PartialEq)]
pub struct MessagesRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub betas: Vec<String>,
    pub max_tokens: u32,
    pub thinking_budget: Option<u32>,
    /// Blocks to mark with an ephemeral cache control. Empty when caching is off.
    pub cache_breakpoints: CacheBreakpoints,
    /// Whether the system prompt is marked as a cache breakpoint too
    pub cache_system: bool,
}

/// The request as it went over the wire, with credentials redacted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// A successful round trip with the endpoint
#[derive(Debug, Clone)]
pub struct ApiExchange {
    pub request: ApiRequest,
    pub response: ApiResponse,
}

/// A failed round trip, keeping whatever transport context is available
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ApiFailure {
    pub request: ApiRequest,
    pub response: Option<ApiResponse>,
    #[source]
    pub error: EndpointError,
}

/// Base trait for model endpoints (direct API, Bedrock, Vertex)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Whether the endpoint honours cache control hints
    fn supports_prompt_caching(&self) -> bool {
        false
    }

    /// Send one messages request and return the raw exchange
    async fn send(&self, request: &MessagesRequest) -> Result<ApiExchange, ApiFailure>;
}
