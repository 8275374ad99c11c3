//! Pure transforms over the conversation applied to the outgoing copy of each request.
//!
//! None of these functions touch the conversation owned by the loop. Each takes a slice
//! and returns a new value, so re-running them on the same input is always safe.
use std::collections::{HashMap, HashSet};

use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;

/// Number of user turns marked as cache breakpoints. The system prompt takes a fourth,
/// which is the most the endpoint accepts in one request.
pub const CACHE_BREAKPOINTS: usize = 3;

/// Stands in for the images of a turn that had nothing else to say
pub const REMOVED_IMAGE_PLACEHOLDER: &str = "[image removed]";

/// Total number of images in the conversation, nested tool result images included
pub fn count_images(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.image_count()).sum()
}

/// Keep only the `keep` most recent images, removing older ones.
///
/// `removal_chunk` rounds the number of removed images down to a multiple of itself, so
/// that the prefix of the conversation only changes every `removal_chunk` images and stays
/// cacheable in between. A chunk of 0 or 1 removes exactly what is needed.
///
/// Tool result blocks are kept even when all of their images go, since each one answers a
/// tool use. Turns are never dropped: a turn left with no content gets a short text block
/// in place of its images, so roles keep alternating.
pub fn trim_images(messages: &[Message], keep: usize, removal_chunk: usize) -> Vec<Message> {
    let total = count_images(messages);
    let mut to_remove = total.saturating_sub(keep);
    if removal_chunk > 1 {
        to_remove -= to_remove % removal_chunk;
    }

    if to_remove == 0 {
        return messages.to_vec();
    }

    let mut trimmed = Vec::with_capacity(messages.len());
    for message in messages {
        if to_remove == 0 || message.image_count() == 0 {
            trimmed.push(message.clone());
            continue;
        }

        let mut content = Vec::with_capacity(message.content.len());
        for block in &message.content {
            match block {
                MessageContent::Image(_) if to_remove > 0 => {
                    to_remove -= 1;
                }
                MessageContent::ToolResult(result) if to_remove > 0 => {
                    let mut result = result.clone();
                    result.content.retain(|c| {
                        if c.is_image() && to_remove > 0 {
                            to_remove -= 1;
                            false
                        } else {
                            true
                        }
                    });
                    content.push(MessageContent::ToolResult(result));
                }
                other => content.push(other.clone()),
            }
        }

        if content.is_empty() {
            content.push(MessageContent::text(REMOVED_IMAGE_PLACEHOLDER));
        }
        trimmed.push(Message {
            role: message.role,
            created: message.created,
            content,
        });
    }

    trimmed
}

/// Positions of content blocks annotated with an ephemeral cache control marker in the
/// outgoing request, as `(message index, block index)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheBreakpoints {
    positions: HashSet<(usize, usize)>,
}

impl CacheBreakpoints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, message_index: usize, block_index: usize) -> bool {
        self.positions.contains(&(message_index, block_index))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Mark the last block of each of the `count` most recent user turns
pub fn cache_breakpoints(messages: &[Message], count: usize) -> CacheBreakpoints {
    let positions = messages
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, m)| m.role == Role::User && !m.content.is_empty())
        .take(count)
        .map(|(i, m)| (i, m.content.len() - 1))
        .collect();
    CacheBreakpoints { positions }
}

/// Check that every tool use is answered by exactly one tool result in the next turn.
///
/// A trailing assistant turn with pending tool uses is accepted, since its results have
/// not been produced yet.
pub fn check_tool_pairing(messages: &[Message]) -> AgentResult<()> {
    for (index, message) in messages.iter().enumerate() {
        let uses: Vec<&str> = message.tool_uses().map(|u| u.id.as_str()).collect();

        if message.role == Role::User && !uses.is_empty() {
            return Err(AgentError::InvalidParameters(format!(
                "user turn {} contains tool use blocks",
                index
            )));
        }

        if message.role == Role::Assistant {
            if message.tool_results().next().is_some() {
                return Err(AgentError::InvalidParameters(format!(
                    "assistant turn {} contains tool result blocks",
                    index
                )));
            }
            if uses.is_empty() {
                continue;
            }

            let Some(next) = messages.get(index + 1) else {
                continue;
            };
            let mut answered: HashMap<&str, usize> = HashMap::new();
            for result in next.tool_results() {
                *answered.entry(result.tool_use_id.as_str()).or_default() += 1;
            }

            for id in &uses {
                match answered.remove(id) {
                    Some(1) => {}
                    Some(n) => {
                        return Err(AgentError::InvalidParameters(format!(
                            "tool use {} answered {} times",
                            id, n
                        )))
                    }
                    None => {
                        return Err(AgentError::InvalidParameters(format!(
                            "tool use {} in turn {} has no result",
                            id, index
                        )))
                    }
                }
            }
            if let Some(id) = answered.keys().next() {
                return Err(AgentError::InvalidParameters(format!(
                    "tool result {} does not match any tool use in turn {}",
                    id, index
                )));
            }
        } else if message.tool_results().next().is_some() {
            let follows_tool_use = index
                .checked_sub(1)
                .and_then(|i| messages.get(i))
                .is_some_and(|p| p.role == Role::Assistant && p.tool_uses().next().is_some());
            if !follows_tool_use {
                return Err(AgentError::InvalidParameters(format!(
                    "tool results in turn {} do not follow any tool use",
                    index
                )));
            }
        }
    }
    Ok(())
}
