use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use super::anthropic::local_failure;
use super::base::{ApiExchange, ApiFailure, MessagesRequest, Provider};
use super::configs::VertexProviderConfig;
use super::utils::{post_with_retry, request_body};
use crate::errors::EndpointError;

pub const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

/// Anthropic models served through Vertex AI's rawPredict API
pub struct VertexProvider {
    client: Client,
    config: VertexProviderConfig,
}

impl VertexProvider {
    pub fn new(config: VertexProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/anthropic/models/{}:rawPredict",
            self.config.endpoint(),
            self.config.project_id,
            self.config.region,
            model
        )
    }

    fn headers(&self, betas: &[String]) -> Result<HeaderMap, EndpointError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.access_token))
                .map_err(|e| EndpointError::Config(format!("invalid access token: {}", e)))?,
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

    fn payload(request: &MessagesRequest) -> Result<Value> {
        let mut body = request_body(request)?;
        body.insert(
            "anthropic_version".to_string(),
            json!(VERTEX_ANTHROPIC_VERSION),
        );
        Ok(Value::Object(body))
    }
}

#[async_trait]
impl Provider for VertexProvider {
    async fn send(&self, request: &MessagesRequest) -> Result<ApiExchange, ApiFailure> {
        let url = self.url(&request.model);
        let payload = Self::payload(request).map_err(|e| {
            local_failure(url.clone(), Value::Null, EndpointError::Config(e.to_string()))
        })?;
        let headers = self
            .headers(&request.betas)
            .map_err(|e| local_failure(url.clone(), payload.clone(), e))?;

        post_with_retry(&self.client, &url, headers, payload, &self.config.retry).await
    }
}
