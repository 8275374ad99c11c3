use crate::errors::EndpointError;
use crate::models::message::MessageContent;
use crate::models::tool::ToolResult;
use crate::providers::base::{ApiRequest, ApiResponse};

/// Observer hooks for a running sampling loop.
///
/// Hooks are called inline from the loop, so a slow hook slows the loop down.
pub trait LoopCallbacks: Send {
    /// One block of an assistant turn, in the order the model produced them
    fn on_content(&mut self, _content: &MessageContent) {}

    /// The result of a tool call, once it is known
    fn on_tool_output(&mut self, _result: &ToolResult, _tool_use_id: &str) {}

    /// Every request sent to the endpoint. `response` is missing when the transport failed,
    /// `error` is set when the exchange failed for any reason.
    fn on_api_exchange(
        &mut self,
        _request: &ApiRequest,
        _response: Option<&ApiResponse>,
        _error: Option<&EndpointError>,
    ) {
    }
}

/// Callbacks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl LoopCallbacks for NoopCallbacks {}
