use bat::WrappingMode;
use console::style;
use cua::callbacks::LoopCallbacks;
use cua::errors::EndpointError;
use cua::models::message::MessageContent;
use cua::models::tool::ToolResult;
use cua::providers::base::{ApiRequest, ApiResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    fn bat_theme(&self) -> &'static str {
        match self {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Prints the loop's progress to the terminal as it happens
pub struct ConsoleCallbacks {
    pub theme: Theme,
}

impl ConsoleCallbacks {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    fn print(&self, content: &str, language: &str, title: Option<String>) {
        let mut input = bat::Input::from_bytes(content.as_bytes());
        if let Some(title) = &title {
            input = input.name(title);
        }

        let printed = bat::PrettyPrinter::new()
            .input(input)
            .theme(self.theme.bat_theme())
            .language(language)
            .grid(title.is_some())
            .header(title.is_some())
            .wrapping_mode(WrappingMode::Character)
            .print();
        if let Err(e) = printed {
            tracing::warn!(error = %e, "failed to render output");
            println!("{}", content);
        }
    }
}

impl LoopCallbacks for ConsoleCallbacks {
    fn on_content(&mut self, content: &MessageContent) {
        match content {
            MessageContent::Text(text) => self.print(&text.text, "Markdown", None),
            MessageContent::Thinking(thinking) => {
                println!("{}", style(&thinking.thinking).dim().italic());
            }
            MessageContent::RedactedThinking(_) => {
                println!("{}", style("[redacted thinking]").dim());
            }
            MessageContent::ToolUse(tool_use) => {
                let arguments = serde_json::to_string_pretty(&tool_use.input)
                    .unwrap_or_else(|_| tool_use.input.to_string());
                self.print(
                    &arguments,
                    "JSON",
                    Some(format!("Tool Request: {}", tool_use.name)),
                );
            }
            MessageContent::Image(image) => {
                println!(
                    "{}",
                    style(format!("[image: {}, {} bytes]", image.mime_type, image.data.len()))
                        .dim()
                );
            }
            MessageContent::ToolResult(_) => {}
        }
    }

    fn on_tool_output(&mut self, result: &ToolResult, tool_use_id: &str) {
        if let Some(system) = &result.system {
            println!("{}", style(system).yellow());
        }
        if let Some(error) = &result.error {
            println!("{} {}", style("Tool Error:").red().bold(), error);
        }
        if let Some(output) = &result.output {
            let language = if output.trim_start().starts_with('{') {
                "JSON"
            } else {
                "Markdown"
            };
            self.print(output, language, Some(format!("Tool Response: {}", tool_use_id)));
        }
        if let Some(image) = &result.base64_image {
            println!(
                "{}",
                style(format!("[screenshot: {} bytes]", image.len())).dim()
            );
        }
        println!();
    }

    fn on_api_exchange(
        &mut self,
        request: &ApiRequest,
        response: Option<&ApiResponse>,
        error: Option<&EndpointError>,
    ) {
        tracing::debug!(
            url = %request.url,
            status = ?response.map(|r| r.status),
            "api exchange"
        );
        if let Some(error) = error {
            eprintln!("{} {}", style("Request failed:").red().bold(), error);
        }
    }
}
