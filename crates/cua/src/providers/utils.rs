use anyhow::{anyhow, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::time::Duration;

use super::base::{ApiExchange, ApiFailure, ApiRequest, ApiResponse, MessagesRequest, Usage};
use super::retry::RetryPolicy;
use crate::errors::EndpointError;
use crate::history::CacheBreakpoints;
use crate::models::content::{Content, ImageContent};
use crate::models::message::{Message, MessageContent, RedactedThinkingContent};
use crate::models::role::Role;
use crate::models::tool::Tool;

const REDACTED: &str = "[redacted]";
const SENSITIVE_HEADERS: [&str; 2] = ["x-api-key", "authorization"];

fn ephemeral() -> Value {
    json!({"type": "ephemeral"})
}

/// Convert an image content into the messages API image source
pub fn convert_image(image: &ImageContent) -> Value {
    json!({
        "type": "image",
        "source": {
            "type": "base64",
            "media_type": image.mime_type,
            "data": image.data,
        }
    })
}

fn content_to_anthropic_spec(content: &Content) -> Value {
    match content {
        Content::Text(text) => json!({"type": "text", "text": text.text}),
        Content::Image(image) => convert_image(image),
    }
}

/// Convert one block of a message to the messages API format
pub fn message_content_to_anthropic_spec(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!({"type": "text", "text": text.text}),
        MessageContent::Image(image) => convert_image(image),
        MessageContent::ToolUse(tool_use) => json!({
            "type": "tool_use",
            "id": tool_use.id,
            "name": tool_use.name,
            "input": tool_use.input,
        }),
        MessageContent::ToolResult(result) => json!({
            "type": "tool_result",
            "tool_use_id": result.tool_use_id,
            "content": result.content.iter().map(content_to_anthropic_spec).collect::<Vec<_>>(),
            "is_error": result.is_error,
        }),
        MessageContent::Thinking(thinking) => json!({
            "type": "thinking",
            "thinking": thinking.thinking,
            "signature": thinking.signature,
        }),
        MessageContent::RedactedThinking(redacted) => json!({
            "type": "redacted_thinking",
            "data": redacted.data,
        }),
    }
}

/// Convert the conversation to the messages API format, marking the cache breakpoints
pub fn messages_to_anthropic_spec(
    messages: &[Message],
    breakpoints: &CacheBreakpoints,
) -> Vec<Value> {
    messages
        .iter()
        .enumerate()
        .map(|(message_index, message)| {
            let content: Vec<Value> = message
                .content
                .iter()
                .enumerate()
                .map(|(block_index, block)| {
                    let mut spec = message_content_to_anthropic_spec(block);
                    if breakpoints.contains(message_index, block_index) {
                        spec["cache_control"] = ephemeral();
                    }
                    spec
                })
                .collect();
            json!({
                "role": message.role,
                "content": content,
            })
        })
        .collect()
}

/// Convert the tool manifest to the messages API format
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(tool.name()) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name()));
        }
        result.push(tool.to_params());
    }

    Ok(result)
}

/// The request body shared by every backend. Backends add the model or version fields
/// they need on top of it.
pub fn request_body(request: &MessagesRequest) -> Result<Map<String, Value>> {
    let mut system = json!({"type": "text", "text": request.system});
    if request.cache_system {
        system["cache_control"] = ephemeral();
    }

    let mut body = Map::new();
    body.insert("max_tokens".to_string(), json!(request.max_tokens));
    body.insert("system".to_string(), json!([system]));
    body.insert(
        "messages".to_string(),
        json!(messages_to_anthropic_spec(
            &request.messages,
            &request.cache_breakpoints
        )),
    );

    let tools = tools_to_anthropic_spec(&request.tools)?;
    if !tools.is_empty() {
        body.insert("tools".to_string(), json!(tools));
    }

    if let Some(budget) = request.thinking_budget.filter(|b| *b > 0) {
        body.insert(
            "thinking".to_string(),
            json!({"type": "enabled", "budget_tokens": budget}),
        );
    }

    Ok(body)
}

/// Convert a messages API response body to an assistant message
pub fn response_to_message(response: &Value) -> Result<(Message, Usage)> {
    let blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("Response has no content array: {}", response))?;

    let mut message = Message::assistant();
    for block in blocks {
        let block_type = block.get("type").and_then(|t| t.as_str()).unwrap_or_default();
        let content = match block_type {
            "text" => MessageContent::text(str_field(block, "text")?),
            "thinking" => MessageContent::thinking(
                str_field(block, "thinking")?,
                str_field(block, "signature")?,
            ),
            "redacted_thinking" => MessageContent::RedactedThinking(RedactedThinkingContent {
                data: str_field(block, "data")?.to_string(),
            }),
            "tool_use" => MessageContent::tool_use(
                str_field(block, "id")?,
                str_field(block, "name")?,
                block.get("input").cloned().unwrap_or_else(|| json!({})),
            ),
            other => {
                tracing::warn!(block_type = other, "Skipping unsupported response block");
                continue;
            }
        };
        message.content.push(content);
    }

    Ok((message, get_usage(response)))
}

fn str_field<'a>(block: &'a Value, field: &str) -> Result<&'a str> {
    block
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Response block is missing `{}`: {}", field, block))
}

/// Token usage reported by the endpoint, if any
pub fn get_usage(response: &Value) -> Usage {
    let usage = &response["usage"];
    let field = |name: &str| usage.get(name).and_then(|v| v.as_i64()).map(|v| v as i32);
    Usage {
        input_tokens: field("input_tokens"),
        output_tokens: field("output_tokens"),
        cache_creation_input_tokens: field("cache_creation_input_tokens"),
        cache_read_input_tokens: field("cache_read_input_tokens"),
    }
}

/// Build the response body a messages endpoint would return for `message`
pub fn message_to_response_body(message: &Message) -> Value {
    let stop_reason = if message.tool_uses().next().is_some() {
        "tool_use"
    } else {
        "end_turn"
    };
    json!({
        "type": "message",
        "role": Role::Assistant,
        "content": message
            .content
            .iter()
            .map(message_content_to_anthropic_spec)
            .collect::<Vec<_>>(),
        "stop_reason": stop_reason,
        "usage": {"input_tokens": 0, "output_tokens": 0},
    })
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or_default().to_string()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// POST a JSON body, retrying transient failures according to `policy`
pub async fn post_with_retry(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    body: Value,
    policy: &RetryPolicy,
) -> Result<ApiExchange, ApiFailure> {
    let request = ApiRequest {
        method: "POST".to_string(),
        url: url.to_string(),
        headers: header_pairs(&headers),
        body,
    };

    let mut retries = 0;
    loop {
        let (error, response, wait_hint) =
            match client.post(url).headers(headers.clone()).json(&request.body).send().await {
                Ok(response) => {
                    let status = response.status();
                    let response_headers = response.headers().clone();
                    let text = match response.text().await {
                        Ok(text) => text,
                        Err(e) => {
                            return Err(ApiFailure {
                                request,
                                response: None,
                                error: e.into(),
                            })
                        }
                    };
                    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
                    let api_response = ApiResponse {
                        status: status.as_u16(),
                        headers: header_pairs(&response_headers),
                        body,
                    };

                    if status == StatusCode::OK {
                        return Ok(ApiExchange {
                            request,
                            response: api_response,
                        });
                    }

                    let error = EndpointError::Status {
                        status: status.as_u16(),
                        body: api_response.body.clone(),
                    };
                    (error, Some(api_response), retry_after(&response_headers))
                }
                Err(e) => (EndpointError::from(e), None, None),
            };

        if !error.is_retryable() || !policy.should_retry(retries) {
            return Err(ApiFailure {
                request,
                response,
                error,
            });
        }

        retries += 1;
        let delay = policy.delay_for(retries, wait_hint);
        tracing::warn!(
            url,
            retry = retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying endpoint request"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::cache_breakpoints;
    use crate::models::tool::ToolResult;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_with(messages: Vec<Message>) -> MessagesRequest {
        MessagesRequest {
            model: "claude-test".to_string(),
            system: "You are a test".to_string(),
            messages,
            tools: vec![Tool::builtin("bash_20250124", "bash")],
            betas: vec![],
            max_tokens: 4096,
            thinking_budget: None,
            cache_breakpoints: CacheBreakpoints::none(),
            cache_system: false,
        }
    }

    #[test]
    fn test_messages_to_anthropic_spec() {
        let messages = vec![
            Message::user().with_text("open calculator"),
            Message::assistant().with_tool_use(
                "toolu_1",
                "computer",
                json!({"action": "screenshot"}),
            ),
            Message::user()
                .with_tool_result("toolu_1", &ToolResult::output("done").with_image("aGk=")),
        ];

        let spec = messages_to_anthropic_spec(&messages, &CacheBreakpoints::none());
        assert_eq!(spec.len(), 3);
        assert_eq!(
            spec[0],
            json!({"role": "user", "content": [{"type": "text", "text": "open calculator"}]})
        );
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"][0]["type"], "tool_use");
        assert_eq!(spec[1]["content"][0]["id"], "toolu_1");
        assert_eq!(
            spec[2]["content"][0],
            json!({
                "type": "tool_result",
                "tool_use_id": "toolu_1",
                "content": [
                    {"type": "text", "text": "done"},
                    {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "aGk="}},
                ],
                "is_error": false,
            })
        );
    }

    #[test]
    fn test_cache_annotation_marks_exactly_the_breakpoints() {
        let mut messages = vec![Message::user().with_text("start")];
        for i in 0..4 {
            let id = format!("toolu_{}", i);
            messages.push(
                Message::assistant().with_tool_use(&id, "bash", json!({"command": "ls"})),
            );
            messages.push(Message::user().with_tool_result(&id, &ToolResult::output("ok")));
        }

        let breakpoints = cache_breakpoints(&messages, 2);
        let annotated = messages_to_anthropic_spec(&messages, &breakpoints);
        let plain = messages_to_anthropic_spec(&messages, &CacheBreakpoints::none());

        let marked: usize = annotated
            .iter()
            .flat_map(|m| m["content"].as_array().cloned().unwrap_or_default())
            .filter(|b| b.get("cache_control").is_some())
            .count();
        assert_eq!(marked, 2);
        assert_eq!(annotated[8]["content"][0]["cache_control"], ephemeral());
        assert_eq!(annotated[6]["content"][0]["cache_control"], ephemeral());

        // stripping the markers gives back the unannotated request
        let mut stripped = annotated.clone();
        for message in &mut stripped {
            for block in message["content"].as_array_mut().into_iter().flatten() {
                if let Some(block) = block.as_object_mut() {
                    block.remove("cache_control");
                }
            }
        }
        assert_eq!(stripped, plain);
    }

    #[test]
    fn test_tools_to_anthropic_spec_duplicate() {
        let tools = vec![
            Tool::builtin("bash_20250124", "bash"),
            Tool::builtin("bash_20241022", "bash"),
        ];
        let result = tools_to_anthropic_spec(&tools);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Duplicate tool name"));
    }

    #[test]
    fn test_request_body() -> Result<()> {
        let mut request = request_with(vec![Message::user().with_text("hi")]);
        request.thinking_budget = Some(1024);
        request.cache_system = true;

        let body = request_body(&request)?;
        assert_eq!(body["max_tokens"], json!(4096));
        assert_eq!(
            body["system"],
            json!([{"type": "text", "text": "You are a test", "cache_control": {"type": "ephemeral"}}])
        );
        assert_eq!(body["tools"], json!([{"type": "bash_20250124", "name": "bash"}]));
        assert_eq!(body["thinking"], json!({"type": "enabled", "budget_tokens": 1024}));
        assert!(body.get("model").is_none());
        Ok(())
    }

    #[test]
    fn test_request_body_skips_zero_thinking_and_empty_tools() -> Result<()> {
        let mut request = request_with(vec![]);
        request.tools.clear();
        request.thinking_budget = Some(0);

        let body = request_body(&request)?;
        assert!(body.get("thinking").is_none());
        assert!(body.get("tools").is_none());
        assert!(body["system"][0].get("cache_control").is_none());
        Ok(())
    }

    #[test]
    fn test_response_to_message() -> Result<()> {
        let response = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "need a screenshot", "signature": "sig"},
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "computer", "input": {"action": "screenshot"}},
                {"type": "server_tool_use", "id": "srv_1", "name": "web_search", "input": {}},
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 15, "cache_read_input_tokens": 100}
        });

        let (message, usage) = response_to_message(&response)?;
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(
            message.content,
            vec![
                MessageContent::thinking("need a screenshot", "sig"),
                MessageContent::text("Let me look."),
                MessageContent::tool_use("toolu_1", "computer", json!({"action": "screenshot"})),
            ]
        );
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.cache_read_input_tokens, Some(100));
        assert_eq!(usage.cache_creation_input_tokens, None);
        Ok(())
    }

    #[test]
    fn test_response_to_message_rejects_malformed_blocks() {
        assert!(response_to_message(&json!({"type": "message"})).is_err());
        let missing_id = json!({"content": [{"type": "tool_use", "name": "bash", "input": {}}]});
        assert!(response_to_message(&missing_id).is_err());
    }

    #[test]
    fn test_response_body_round_trip_keeps_blocks() -> Result<()> {
        let message = Message::assistant()
            .with_text("clicking")
            .with_tool_use(
                "toolu_9",
                "computer",
                json!({"action": "left_click", "coordinate": [10, 20]}),
            );
        let (parsed, _) = response_to_message(&message_to_response_body(&message))?;
        assert_eq!(parsed.content, message.content);
        Ok(())
    }

    #[test]
    fn test_header_pairs_redacts_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("sk-secret"));
        headers.insert("authorization", HeaderValue::from_static("Bearer token"));
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let pairs = header_pairs(&headers);
        assert!(pairs.contains(&("x-api-key".to_string(), REDACTED.to_string())));
        assert!(pairs.contains(&("authorization".to_string(), REDACTED.to_string())));
        assert!(pairs.contains(&("anthropic-version".to_string(), "2023-06-01".to_string())));
    }

    #[tokio::test]
    async fn test_post_with_retry_recovers_from_overload() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({"type": "error"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::with_max_retries(2)
        };
        let exchange = post_with_retry(
            &Client::new(),
            &format!("{}/v1/messages", server.uri()),
            HeaderMap::new(),
            json!({"max_tokens": 1}),
            &policy,
        )
        .await?;

        assert_eq!(exchange.response.status, 200);
        assert_eq!(exchange.request.body, json!({"max_tokens": 1}));
        Ok(())
    }

    #[tokio::test]
    async fn test_post_with_retry_gives_up_on_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"type": "error", "error": {"message": "bad"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let failure = post_with_retry(
            &Client::new(),
            &server.uri(),
            HeaderMap::new(),
            json!({}),
            &RetryPolicy::with_max_retries(4),
        )
        .await
        .unwrap_err();

        assert!(matches!(failure.error, EndpointError::Status { status: 400, .. }));
        assert_eq!(failure.response.map(|r| r.status), Some(400));
    }
}
