//! Folding streamed deltas into one assistant message

use crate::protocol::{
    CompletionUsage, FunctionCall, Message, MessageContent, MessageRole, StreamFrame, ToolCall,
    ToolCallDelta,
};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PartialToolCall {
    id: Option<String>,
    tool_type: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PartialToolCall {
    fn merge(&mut self, delta: &ToolCallDelta) {
        if self.id.is_none() {
            self.id = delta.id.clone();
        }
        if self.tool_type.is_none() {
            self.tool_type = delta.tool_type.clone();
        }
        if let Some(function) = &delta.function {
            if self.name.is_none() {
                self.name = function.name.clone();
            }
            if let Some(arguments) = &function.arguments {
                self.arguments.push_str(arguments);
            }
        }
    }
}

/// Accumulates the first choice of a streamed turn
///
/// Tool call fragments are merged by their position index: the first id,
/// type and name seen win, argument fragments concatenate in arrival order.
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    content: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Option<CompletionUsage>,
    frames: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame
    pub fn push(&mut self, frame: &StreamFrame) {
        self.frames += 1;
        if frame.usage.is_some() {
            self.usage = frame.usage;
        }

        let Some(choice) = frame.choices.iter().find(|choice| choice.index == 0) else {
            return;
        };

        if let Some(fragment) = &choice.delta.content {
            self.content.push_str(fragment);
        }
        for delta in choice.delta.tool_calls.iter().flatten() {
            self.tool_calls.entry(delta.index).or_default().merge(delta);
        }
        if let Some(reason) = &choice.finish_reason {
            self.finish_reason = Some(reason.clone());
        }
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.content
    }

    /// Last terminal reason seen
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Usage reported by the stream, if any frame carried it
    pub fn usage(&self) -> Option<CompletionUsage> {
        self.usage
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// True when no text and no tool call has been received
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty()
    }

    /// Assemble the assistant message
    pub fn into_message(self) -> Message {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .map(|(index, part)| ToolCall {
                index,
                id: part.id,
                tool_type: part.tool_type.unwrap_or_else(|| "function".to_string()),
                function: FunctionCall {
                    name: part.name.unwrap_or_default(),
                    arguments: part.arguments,
                },
            })
            .collect();

        Message {
            role: MessageRole::Assistant,
            content: MessageContent::Text(self.content),
            name: None,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        }
    }
}

impl<'a> Extend<&'a StreamFrame> for StreamAccumulator {
    fn extend<I: IntoIterator<Item = &'a StreamFrame>>(&mut self, frames: I) {
        for frame in frames {
            self.push(frame);
        }
    }
}
