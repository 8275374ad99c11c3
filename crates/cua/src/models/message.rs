use super::content::{Content, ImageContent, TextContent};
use super::role::Role;
use super::tool::ToolResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: Vec<Content>,
    pub is_error: bool,
}

impl ToolResultBlock {
    /// Fold a tool result into the block answering `tool_use_id`
    pub fn from_result<S: Into<String>>(tool_use_id: S, result: &ToolResult) -> Self {
        let mut content = Vec::new();
        let is_error = result.is_error();

        if let Some(error) = &result.error {
            content.push(Content::text(result.with_system_prefix(error)));
        } else {
            if let Some(output) = &result.output {
                content.push(Content::text(result.with_system_prefix(output)));
            }
            if let Some(image) = &result.base64_image {
                content.push(Content::image(image.clone(), "image/png"));
            }
        }

        Self {
            tool_use_id: tool_use_id.into(),
            content,
            is_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingContent {
    pub thinking: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedThinkingContent {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    Image(ImageContent),
    ToolUse(ToolUse),
    ToolResult(ToolResultBlock),
    Thinking(ThinkingContent),
    RedactedThinking(RedactedThinkingContent),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        MessageContent::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
        })
    }

    pub fn tool_use<I: Into<String>, N: Into<String>>(id: I, name: N, input: Value) -> Self {
        MessageContent::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    pub fn tool_result<S: Into<String>>(tool_use_id: S, result: &ToolResult) -> Self {
        MessageContent::ToolResult(ToolResultBlock::from_result(tool_use_id, result))
    }

    pub fn thinking<T: Into<String>, S: Into<String>>(thinking: T, signature: S) -> Self {
        MessageContent::Thinking(ThinkingContent {
            thinking: thinking.into(),
            signature: signature.into(),
        })
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        if let MessageContent::ToolUse(ref tool_use) = self {
            Some(tool_use)
        } else {
            None
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        if let MessageContent::ToolResult(ref tool_result) = self {
            Some(tool_result)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    /// Number of images carried by this block, including those nested in a tool result
    pub fn image_count(&self) -> usize {
        match self {
            MessageContent::Image(_) => 1,
            MessageContent::ToolResult(result) => {
                result.content.iter().filter(|c| c.is_image()).count()
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A turn in the conversation
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message {
            role: Role::User,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, data: S, mime_type: T) -> Self {
        self.with_content(MessageContent::image(data, mime_type))
    }

    /// Add a tool use request to the message
    pub fn with_tool_use<I: Into<String>, N: Into<String>>(
        self,
        id: I,
        name: N,
        input: Value,
    ) -> Self {
        self.with_content(MessageContent::tool_use(id, name, input))
    }

    /// Add the result answering a tool use to the message
    pub fn with_tool_result<S: Into<String>>(self, tool_use_id: S, result: &ToolResult) -> Self {
        self.with_content(MessageContent::tool_result(tool_use_id, result))
    }

    /// All tool use requests in this message, in the order they were issued
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(|c| c.as_tool_use())
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResultBlock> {
        self.content.iter().filter_map(|c| c.as_tool_result())
    }

    pub fn image_count(&self) -> usize {
        self.content.iter().map(|c| c.image_count()).sum()
    }

    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
