use super::{
    anthropic::AnthropicProvider, base::Provider, bedrock::BedrockProvider,
    configs::ProviderConfig, vertex::VertexProvider,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// The backends a sampling loop can talk to
#[derive(
    EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    Anthropic,
    Bedrock,
    Vertex,
}

impl ApiProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            ApiProvider::Anthropic => "claude-3-7-sonnet-20250219",
            ApiProvider::Bedrock => "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
            ApiProvider::Vertex => "claude-3-7-sonnet@20250219",
        }
    }
}

impl ProviderConfig {
    pub fn api_provider(&self) -> ApiProvider {
        match self {
            ProviderConfig::Anthropic(_) => ApiProvider::Anthropic,
            ProviderConfig::Bedrock(_) => ApiProvider::Bedrock,
            ProviderConfig::Vertex(_) => ApiProvider::Vertex,
        }
    }
}

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
        ProviderConfig::Bedrock(bedrock_config) => {
            Ok(Box::new(BedrockProvider::new(bedrock_config)?))
        }
        ProviderConfig::Vertex(vertex_config) => Ok(Box::new(VertexProvider::new(vertex_config)?)),
    }
}
