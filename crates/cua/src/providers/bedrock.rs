use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use super::anthropic::local_failure;
use super::base::{ApiExchange, ApiFailure, MessagesRequest, Provider};
use super::configs::BedrockProviderConfig;
use super::utils::{post_with_retry, request_body};
use crate::errors::EndpointError;

pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Anthropic models served through AWS Bedrock's InvokeModel API
pub struct BedrockProvider {
    client: Client,
    config: BedrockProviderConfig,
}

impl BedrockProvider {
    pub fn new(config: BedrockProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/model/{}/invoke",
            self.config.endpoint(),
            urlencoding::encode(model)
        )
    }

    fn headers(&self) -> Result<HeaderMap, EndpointError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| EndpointError::Config(format!("invalid api key: {}", e)))?,
        );
        Ok(headers)
    }

    /// The model travels in the url, betas travel in the body
    fn payload(request: &MessagesRequest) -> Result<Value> {
        let mut body = request_body(request)?;
        body.insert(
            "anthropic_version".to_string(),
            json!(BEDROCK_ANTHROPIC_VERSION),
        );
        if !request.betas.is_empty() {
            body.insert("anthropic_beta".to_string(), json!(request.betas));
        }
        Ok(Value::Object(body))
    }
}

#[async_trait]
impl Provider for BedrockProvider {
    async fn send(&self, request: &MessagesRequest) -> Result<ApiExchange, ApiFailure> {
        let url = self.url(&request.model);
        let payload = Self::payload(request).map_err(|e| {
            local_failure(url.clone(), Value::Null, EndpointError::Config(e.to_string()))
        })?;
        let headers = self
            .headers()
            .map_err(|e| local_failure(url.clone(), payload.clone(), e))?;

        post_with_retry(&self.client, &url, headers, payload, &self.config.retry).await
    }
}
