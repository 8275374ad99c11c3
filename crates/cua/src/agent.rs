use anyhow::{Context as _, Result};
use chrono::Local;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::{debug, error, info, warn};

use crate::callbacks::LoopCallbacks;
use crate::history::{
    cache_breakpoints, check_tool_pairing, trim_images, CacheBreakpoints, CACHE_BREAKPOINTS,
};
use crate::models::message::{Message, ToolUse};
use crate::models::tool::ToolResult;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{ApiFailure, MessagesRequest, Provider};
use crate::providers::factory::ApiProvider;
use crate::providers::utils::response_to_message;
use crate::tools::ToolDispatcher;

pub const TOKEN_EFFICIENT_TOOLS_BETA: &str = "token-efficient-tools-2025-02-19";
pub const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";

/// Knobs for a sampling loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub model: String,
    /// Appended to the built-in system prompt after a single space
    pub system_prompt_suffix: String,
    /// Only send this many of the most recent screenshots
    pub only_n_most_recent_images: Option<usize>,
    pub image_removal_chunk: usize,
    pub max_tokens: u32,
    pub thinking_budget: Option<u32>,
    pub token_efficient_tools_beta: bool,
    /// Run all tool uses of a turn concurrently instead of one by one
    pub parallel_tool_calls: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: ApiProvider::Anthropic.default_model().to_string(),
            system_prompt_suffix: String::new(),
            only_n_most_recent_images: None,
            image_removal_chunk: 1,
            max_tokens: 4096,
            thinking_budget: None,
            token_efficient_tools_beta: false,
            parallel_tool_calls: false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct SystemInfo {
    os: &'static str,
    os_release: String,
    os_version: String,
    arch: &'static str,
    date: String,
}

impl SystemInfo {
    fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            os_release: System::os_version().unwrap_or_else(|| "unknown".to_string()),
            os_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            arch: std::env::consts::ARCH,
            date: Local::now().format("%A, %B %-d, %Y").to_string(),
        }
    }
}

#[derive(Debug)]
enum TurnOutcome {
    /// The model answered without using a tool
    Finished(Message),
    /// The assistant turn and the user turn answering its tool uses
    ToolResults(Message, Message),
}

#[derive(Debug, thiserror::Error)]
enum LoopError {
    #[error(transparent)]
    Endpoint(#[from] ApiFailure),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Agent drives a model endpoint and a set of computer use tools in turns
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: Box<dyn ToolDispatcher>,
    config: LoopConfig,
    system_prompt: String,
}

impl Agent {
    pub fn new(
        provider: Box<dyn Provider>,
        tools: Box<dyn ToolDispatcher>,
        config: LoopConfig,
    ) -> Result<Self> {
        let mut system_prompt = load_prompt_file("system.md", &SystemInfo::current())
            .context("Failed to render the system prompt")?;
        system_prompt.truncate(system_prompt.trim_end().len());
        if !config.system_prompt_suffix.is_empty() {
            system_prompt.push(' ');
            system_prompt.push_str(&config.system_prompt_suffix);
        }

        Ok(Self {
            provider,
            tools,
            config,
            system_prompt,
        })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run turns until the model answers without using a tool.
    ///
    /// Never fails: when the endpoint or the response goes wrong the error is logged and
    /// reported through `callbacks`, and the conversation as it stood is returned.
    pub async fn sampling_loop(
        &self,
        messages: Vec<Message>,
        callbacks: &mut dyn LoopCallbacks,
    ) -> Vec<Message> {
        let mut messages = messages;
        if let Err(e) = check_tool_pairing(&messages) {
            warn!(error = %e, "conversation does not pair tool uses with results");
        }

        info!(
            model = %self.config.model,
            turns = messages.len(),
            "starting sampling loop"
        );

        loop {
            match self.run_turn(&messages, callbacks).await {
                Ok(TurnOutcome::Finished(assistant)) => {
                    messages.push(assistant);
                    break;
                }
                Ok(TurnOutcome::ToolResults(assistant, results)) => {
                    messages.push(assistant);
                    messages.push(results);
                }
                Err(LoopError::Endpoint(failure)) => {
                    error!(
                        url = %failure.request.url,
                        status = ?failure.response.as_ref().map(|r| r.status),
                        error = %failure.error,
                        "model endpoint request failed"
                    );
                    break;
                }
                Err(LoopError::Internal(e)) => {
                    error!(error = ?e, turns = messages.len(), "sampling loop aborted");
                    break;
                }
            }
        }

        info!(turns = messages.len(), "sampling loop finished");
        messages
    }

    async fn run_turn(
        &self,
        messages: &[Message],
        callbacks: &mut dyn LoopCallbacks,
    ) -> Result<TurnOutcome, LoopError> {
        let request = self.build_request(messages);
        debug!(
            turns = request.messages.len(),
            betas = ?request.betas,
            cache_breakpoints = request.cache_breakpoints.len(),
            "sending request"
        );

        let exchange = match self.provider.send(&request).await {
            Ok(exchange) => exchange,
            Err(failure) => {
                callbacks.on_api_exchange(
                    &failure.request,
                    failure.response.as_ref(),
                    Some(&failure.error),
                );
                return Err(failure.into());
            }
        };
        callbacks.on_api_exchange(&exchange.request, Some(&exchange.response), None);

        let (assistant, usage) = response_to_message(&exchange.response.body)
            .context("Failed to parse the model response")?;
        debug!(?usage, "received response");

        for content in &assistant.content {
            callbacks.on_content(content);
        }

        let tool_uses: Vec<ToolUse> = assistant.tool_uses().cloned().collect();
        if tool_uses.is_empty() {
            return Ok(TurnOutcome::Finished(assistant));
        }

        let mut results = Message::user();
        if self.config.parallel_tool_calls {
            let outputs = join_all(
                tool_uses
                    .iter()
                    .map(|tool_use| self.tools.run(&tool_use.name, tool_use.input.clone())),
            )
            .await;
            for (tool_use, output) in tool_uses.iter().zip(outputs) {
                results = answer(results, tool_use, &output, callbacks);
            }
        } else {
            for tool_use in &tool_uses {
                let output = self.tools.run(&tool_use.name, tool_use.input.clone()).await;
                results = answer(results, tool_use, &output, callbacks);
            }
        }

        Ok(TurnOutcome::ToolResults(assistant, results))
    }

    /// Build the outgoing copy of the conversation. The conversation itself is left alone.
    fn build_request(&self, messages: &[Message]) -> MessagesRequest {
        let messages = match self.config.only_n_most_recent_images {
            Some(keep) => trim_images(messages, keep, self.config.image_removal_chunk),
            None => messages.to_vec(),
        };

        let caching = self.provider.supports_prompt_caching();
        let breakpoints = if caching {
            cache_breakpoints(&messages, CACHE_BREAKPOINTS)
        } else {
            CacheBreakpoints::none()
        };

        let mut betas = Vec::new();
        if let Some(flag) = self.tools.beta_flag() {
            betas.push(flag.to_string());
        }
        if self.config.token_efficient_tools_beta {
            betas.push(TOKEN_EFFICIENT_TOOLS_BETA.to_string());
        }
        if caching {
            betas.push(PROMPT_CACHING_BETA.to_string());
        }

        MessagesRequest {
            model: self.config.model.clone(),
            system: self.system_prompt.clone(),
            messages,
            tools: self.tools.manifest().to_vec(),
            betas,
            max_tokens: self.config.max_tokens,
            thinking_budget: self.config.thinking_budget.filter(|budget| *budget > 0),
            cache_breakpoints: breakpoints,
            cache_system: caching,
        }
    }
}

fn answer(
    results: Message,
    tool_use: &ToolUse,
    output: &ToolResult,
    callbacks: &mut dyn LoopCallbacks,
) -> Message {
    if output.is_error() {
        debug!(tool = %tool_use.name, id = %tool_use.id, "tool returned an error");
    }
    callbacks.on_tool_output(output, &tool_use.id);
    results.with_tool_result(tool_use.id.clone(), output)
}
