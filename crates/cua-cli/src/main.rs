use anyhow::{Context, Result};
use clap::Parser;
use cua::agent::Agent;
use cua::providers::factory::{get_provider, ApiProvider};
use cua::tools::ToolCollection;
use std::path::PathBuf;

mod bridge;
mod configuration;
mod logging;
mod render;
mod session;

use configuration::Settings;
use render::{ConsoleCallbacks, Theme};
use session::Session;

#[derive(Parser)]
#[command(author, version, about = "Let a model operate this computer", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to <config dir>/cua/config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model backend: anthropic, bedrock or vertex
    #[arg(short, long)]
    provider: Option<ApiProvider>,

    /// Model to use, overrides the config file
    #[arg(short, long)]
    model: Option<String>,

    /// Executable that runs tool calls, overrides the config file
    #[arg(short, long)]
    bridge: Option<PathBuf>,

    /// Run this task once without an interactive session
    #[arg(long)]
    prompt: Option<String>,

    /// Render with a light terminal theme
    #[arg(long)]
    light: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(provider) = cli.provider {
        if provider != settings.provider.api {
            // A model name only means something to the backend it was chosen for
            settings.provider.model = None;
        }
        settings.provider.api = provider;
    }
    if let Some(model) = cli.model {
        settings.provider.model = Some(model);
    }
    if let Some(bridge) = cli.bridge {
        settings.tools.bridge = Some(bridge);
    }

    logging::init_logging(&settings.logging)?;
    tracing::info!(
        provider = %settings.provider.api,
        tool_version = %settings.tools.version,
        "starting cua"
    );

    let loop_config = settings.loop_config();
    let provider = get_provider(settings.provider.into_config()?)?;

    let mut tools = ToolCollection::from_version(settings.tools.version, &settings.tools.display);
    match settings.tools.bridge {
        Some(program) => tools = bridge::with_bridge(tools, program),
        None => eprintln!(
            "No tool bridge configured: every tool call will fail. Set tools.bridge or pass --bridge."
        ),
    }

    let agent = Agent::new(provider, Box::new(tools), loop_config)?;
    let theme = if cli.light { Theme::Light } else { Theme::Dark };
    let mut session = Session::new(agent, ConsoleCallbacks::new(theme));

    match cli.prompt {
        Some(task) => session.headless_start(task).await,
        None => session.start().await,
    }
}
