//! Protocol module for chat completion request/response structures
//!
//! These structures are designed to be:
//! - Wire-compatible with OpenAI-style chat completion endpoints
//! - Lenient when decoding remote payloads
//! - Serializable for persistence collaborators

pub mod types;

pub use types::{
    ChatRequest, ChatResponse, CompletionUsage, ContentPart, FunctionCall, FunctionCallDelta,
    FunctionDefinition, ImageDetail, ImageUrl, Message, MessageBuilder, MessageContent,
    MessageDelta, MessageRole, ResponseChoice, ResponseFormat, StreamChoice, StreamFrame,
    ToolCall, ToolCallDelta, ToolDefinition,
};
