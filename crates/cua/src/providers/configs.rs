use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;

use super::retry::RetryPolicy;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Unified enum to wrap the configuration of each backend
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    Bedrock(BedrockProviderConfig),
    Vertex(VertexProviderConfig),
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl AnthropicProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: ANTHROPIC_HOST.to_string(),
            api_key: api_key.into(),
            retry: RetryPolicy::with_max_retries(4),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = get_env("ANTHROPIC_API_KEY", true, None)?
            .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY must be set"))?;
        let mut config = Self::new(api_key);
        if let Some(host) = get_env("ANTHROPIC_BASE_URL", false, None)? {
            config.host = host;
        }
        Ok(config)
    }
}

/// Bedrock authenticates with a Bedrock API key sent as a bearer token
#[derive(Debug, Clone)]
pub struct BedrockProviderConfig {
    pub region: String,
    pub api_key: String,
    /// Overrides the regional runtime endpoint, mostly for tests
    pub host: Option<String>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl BedrockProviderConfig {
    pub fn new<R: Into<String>, K: Into<String>>(region: R, api_key: K) -> Self {
        Self {
            region: region.into(),
            api_key: api_key.into(),
            host: None,
            retry: RetryPolicy::with_max_retries(2),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self> {
        let region = get_env("AWS_REGION", false, Some("us-east-1".to_string()))?
            .unwrap_or_default();
        let api_key = get_env("AWS_BEARER_TOKEN_BEDROCK", true, None)?
            .ok_or_else(|| anyhow!("AWS_BEARER_TOKEN_BEDROCK must be set"))?;
        Ok(Self::new(region, api_key))
    }

    pub fn endpoint(&self) -> String {
        match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

/// Vertex authenticates with a Google OAuth access token
#[derive(Debug, Clone)]
pub struct VertexProviderConfig {
    pub region: String,
    pub project_id: String,
    pub access_token: String,
    pub host: Option<String>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl VertexProviderConfig {
    pub fn new<R, P, T>(region: R, project_id: P, access_token: T) -> Self
    where
        R: Into<String>,
        P: Into<String>,
        T: Into<String>,
    {
        Self {
            region: region.into(),
            project_id: project_id.into(),
            access_token: access_token.into(),
            host: None,
            retry: RetryPolicy::with_max_retries(2),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self> {
        let region = get_env("CLOUD_ML_REGION", false, Some("us-east5".to_string()))?
            .unwrap_or_default();
        let project_id = get_env("ANTHROPIC_VERTEX_PROJECT_ID", true, None)?
            .ok_or_else(|| anyhow!("ANTHROPIC_VERTEX_PROJECT_ID must be set"))?;
        let access_token = get_env("GOOGLE_ACCESS_TOKEN", true, None)?
            .ok_or_else(|| anyhow!("GOOGLE_ACCESS_TOKEN must be set"))?;
        Ok(Self::new(region, project_id, access_token))
    }

    pub fn endpoint(&self) -> String {
        match (&self.host, self.region.as_str()) {
            (Some(host), _) => host.trim_end_matches('/').to_string(),
            (None, "global") => "https://aiplatform.googleapis.com".to_string(),
            (None, region) => format!("https://{}-aiplatform.googleapis.com", region),
        }
    }
}

/// Helper function to get environment variables with error handling
pub fn get_env(key: &str, required: bool, default: Option<String>) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
        Ok(_) | Err(env::VarError::NotPresent) if !required => Ok(default),
        Ok(_) | Err(env::VarError::NotPresent) => Err(anyhow!(
            "Environment variable '{}' is required but not set.",
            key
        )),
        Err(e) => Err(e.into()),
    }
}
