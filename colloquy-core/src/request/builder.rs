//! Outbound request assembly

use crate::config::{ConfigError, ConfigResult};
use crate::conversation::{advisory, ConversationState};
use crate::protocol::{ChatRequest, Message, ToolDefinition};
use tracing::debug;

/// Parse serialized tool descriptors; blank text means no tools
pub fn parse_tool_schema(text: &str) -> ConfigResult<Option<Vec<ToolDefinition>>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<Vec<ToolDefinition>>(text)
        .map(Some)
        .map_err(|e| ConfigError::ToolSchema {
            message: e.to_string(),
        })
}

/// Build the request body for the current state
///
/// The system prompt, when non-blank, becomes a leading system message ahead
/// of the post-eviction history. Optional knobs are only sent when their
/// enable flag is set. A malformed tool schema fails here, before any
/// transport call.
pub fn build_request(state: &ConversationState) -> ConfigResult<ChatRequest> {
    let config = state.config();
    let tools = parse_tool_schema(&config.tools)?;

    let mut messages = Vec::with_capacity(state.len() + 1);
    if !config.system_prompt.trim().is_empty() {
        messages.push(Message::system(config.system_prompt.as_str()));
    }
    messages.extend(state.messages().iter().cloned());

    advisory::check_and_log(&messages);

    let mut request = ChatRequest::new(config.model.as_str(), messages)
        .with_streaming(config.stream)
        .with_penalties(config.frequency_penalty, config.presence_penalty);

    if config.temperature_enabled {
        request = request.with_temperature(config.temperature);
    }
    if config.top_p_enabled {
        request = request.with_top_p(config.top_p);
    }
    if config.max_tokens_enabled {
        request = request.with_max_tokens(config.max_tokens);
    }
    if config.json_mode {
        request = request.with_json_mode();
    }
    if let Some(tools) = tools {
        request = request.with_tools(tools);
    }

    debug!(
        model = %request.model,
        messages = request.messages.len(),
        stream = request.stream,
        tools = request.tools.as_ref().map_or(0, Vec::len),
        "Built chat request"
    );

    Ok(request)
}
