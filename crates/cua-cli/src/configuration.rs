use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use cua::agent::LoopConfig;
use cua::providers::configs::{
    get_env, AnthropicProviderConfig, BedrockProviderConfig, ProviderConfig, VertexProviderConfig,
};
use cua::providers::factory::ApiProvider;
use cua::tools::{DisplayConfig, ToolVersion};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Which backend to talk to. Credentials always come from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api: ApiProvider,
    pub model: Option<String>,
    /// Replaces the backend's default endpoint
    pub base_url: Option<String>,
    pub region: Option<String>,
    pub project_id: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api: ApiProvider::Anthropic,
            model: None,
            base_url: None,
            region: None,
            project_id: None,
        }
    }
}

impl ProviderSettings {
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.api.default_model().to_string())
    }

    pub fn into_config(self) -> Result<ProviderConfig> {
        match self.api {
            ApiProvider::Anthropic => {
                let mut config = AnthropicProviderConfig::from_env()?;
                if let Some(host) = self.base_url {
                    config.host = host;
                }
                Ok(ProviderConfig::Anthropic(config))
            }
            ApiProvider::Bedrock => {
                let mut config = BedrockProviderConfig::from_env()?;
                if let Some(region) = self.region {
                    config.region = region;
                }
                config.host = self.base_url;
                Ok(ProviderConfig::Bedrock(config))
            }
            ApiProvider::Vertex => {
                let region = match self.region {
                    Some(region) => region,
                    None => get_env("CLOUD_ML_REGION", false, Some("us-east5".to_string()))?
                        .unwrap_or_default(),
                };
                let project_id = match self.project_id {
                    Some(project_id) => project_id,
                    None => get_env("ANTHROPIC_VERTEX_PROJECT_ID", false, None)?
                        .ok_or_else(|| anyhow!("A Vertex project id is required"))?,
                };
                let access_token = get_env("GOOGLE_ACCESS_TOKEN", true, None)?
                    .ok_or_else(|| anyhow!("GOOGLE_ACCESS_TOKEN must be set"))?;

                let mut config = VertexProviderConfig::new(region, project_id, access_token);
                config.host = self.base_url;
                Ok(ProviderConfig::Vertex(config))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub version: ToolVersion,
    pub display: DisplayConfig,
    /// Executable that carries out tool calls, invoked as `<bridge> <tool name>`
    pub bridge: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file: PathBuf,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("sampling_loop.log"),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSettings,
    #[serde(rename = "loop")]
    pub sampling: LoopConfig,
    pub tools: ToolSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Defaults, then the config file, then `CUA_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => match default_config_file() {
                Some(path) => builder.add_source(File::from(path).required(false)),
                None => builder,
            },
        };

        let config = builder
            .add_source(
                Environment::with_prefix("CUA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        tracing::debug!(?settings, "loaded settings");
        Ok(settings)
    }

    /// The loop configuration, with the model resolved against the chosen backend
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            model: self.provider.model(),
            ..self.sampling.clone()
        }
    }
}

pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cua").join("config.toml"))
}
