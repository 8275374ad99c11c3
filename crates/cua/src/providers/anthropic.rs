use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use super::base::{ApiExchange, ApiFailure, ApiRequest, MessagesRequest, Provider};
use super::configs::AnthropicProviderConfig;
use super::utils::{post_with_retry, request_body};
use crate::errors::EndpointError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The first-party messages API
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/v1/messages", self.config.host.trim_end_matches('/'))
    }

    fn headers(&self, betas: &[String]) -> Result<HeaderMap, EndpointError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| EndpointError::Config(format!("invalid api key: {}", e)))?,
        );
        if !betas.is_empty() {
            headers.insert(
                "anthropic-beta",
                HeaderValue::from_str(&betas.join(","))
                    .map_err(|e| EndpointError::Config(format!("invalid beta flag: {}", e)))?,
            );
        }
        Ok(headers)
    }

    fn payload(&self, request: &MessagesRequest) -> Result<Value> {
        let mut body = request_body(request)?;
        body.insert("model".to_string(), json!(request.model));
        Ok(Value::Object(body))
    }
}

/// Wrap a failure that happened before anything went over the wire
pub(crate) fn local_failure(url: String, body: Value, error: EndpointError) -> ApiFailure {
    ApiFailure {
        request: ApiRequest {
            method: "POST".to_string(),
            url,
            headers: Vec::new(),
            body,
        },
        response: None,
        error,
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn supports_prompt_caching(&self) -> bool {
        true
    }

    async fn send(&self, request: &MessagesRequest) -> Result<ApiExchange, ApiFailure> {
        let url = self.url();
        let payload = self
            .payload(request)
            .map_err(|e| {
                local_failure(url.clone(), Value::Null, EndpointError::Config(e.to_string()))
            })?;
        let headers = self
            .headers(&request.betas)
            .map_err(|e| local_failure(url.clone(), payload.clone(), e))?;

        post_with_retry(&self.client, &url, headers, payload, &self.config.retry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CacheBreakpoints;
    use crate::models::message::{Message, MessageContent};
    use crate::models::tool::Tool;
    use crate::providers::retry::RetryPolicy;
    use crate::providers::utils::response_to_message;
    use wiremock::matchers::{body_partial_json, header, headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(host: String) -> AnthropicProviderConfig {
        AnthropicProviderConfig {
            host,
            retry: RetryPolicy::none(),
            ..AnthropicProviderConfig::new("test_api_key")
        }
    }

    fn test_request() -> MessagesRequest {
        MessagesRequest {
            model: "claude-3-7-sonnet-20250219".to_string(),
            system: "You are a helpful assistant.".to_string(),
            messages: vec![Message::user().with_text("Hello?")],
            tools: vec![Tool::builtin("bash_20250124", "bash")],
            betas: vec![
                "computer-use-2025-01-24".to_string(),
                "prompt-caching-2024-07-31".to_string(),
            ],
            max_tokens: 4096,
            thinking_budget: None,
            cache_breakpoints: CacheBreakpoints::none(),
            cache_system: true,
        }
    }

    async fn setup_mock_server(response_body: Value) -> (MockServer, AnthropicProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(headers(
                "anthropic-beta",
                vec!["computer-use-2025-01-24", "prompt-caching-2024-07-31"],
            ))
            .and(body_partial_json(json!({
                "model": "claude-3-7-sonnet-20250219",
                "max_tokens": 4096,
                "tools": [{"type": "bash_20250124", "name": "bash"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::new(test_config(mock_server.uri())).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_send_basic() -> Result<()> {
        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "Hello! How can I assist you today?"
            }],
            "model": "claude-3-7-sonnet-20250219",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {
                "input_tokens": 12,
                "output_tokens": 15
            }
        });

        let (server, provider) = setup_mock_server(response_body).await;
        assert!(provider.supports_prompt_caching());

        let exchange = provider.send(&test_request()).await?;
        assert_eq!(exchange.response.status, 200);
        let received = server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0]
                .headers
                .get("anthropic-beta")
                .and_then(|v| v.to_str().ok()),
            Some("computer-use-2025-01-24,prompt-caching-2024-07-31")
        );
        assert!(exchange
            .request
            .headers
            .contains(&("x-api-key".to_string(), "[redacted]".to_string())));
        assert_eq!(
            exchange.request.body["system"][0]["cache_control"],
            json!({"type": "ephemeral"})
        );

        let (message, usage) = response_to_message(&exchange.response.body)?;
        assert_eq!(
            message.content,
            vec![MessageContent::text("Hello! How can I assist you today?")]
        );
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_reports_status_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::new(test_config(mock_server.uri())).unwrap();
        let failure = provider.send(&test_request()).await.unwrap_err();

        match &failure.error {
            EndpointError::Status { status, body } => {
                assert_eq!(*status, 401);
                assert_eq!(body["error"]["type"], "authentication_error");
            }
            other => panic!("Expected status error, got {:?}", other),
        }
        assert_eq!(failure.request.url, format!("{}/v1/messages", mock_server.uri()));
        assert_eq!(failure.response.map(|r| r.status), Some(401));
    }

    #[tokio::test]
    async fn test_send_reports_duplicate_tools_without_sending() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::new(test_config(mock_server.uri())).unwrap();
        let mut request = test_request();
        request.tools.push(Tool::builtin("bash_20241022", "bash"));

        let failure = provider.send(&request).await.unwrap_err();
        assert!(matches!(failure.error, EndpointError::Config(_)));
        assert!(failure.response.is_none());
    }
}
