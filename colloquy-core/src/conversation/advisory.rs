//! Advisory structural checks over a message list
//!
//! None of these findings block a request. They are logged and handed back
//! to the caller, who may surface them or ignore them.

use crate::protocol::{Message, MessageRole};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// A non-fatal structural anomaly in the message list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryWarning {
    /// A system message appears after the leading run of system messages
    SystemMessageOutOfPlace { position: usize },

    /// A name tag is set on a message whose role is not system
    NameOnNonSystem { position: usize, role: MessageRole },

    /// A tool result references no tool call still present earlier in the list
    OrphanedToolResult {
        position: usize,
        tool_call_id: Option<String>,
    },
}

impl fmt::Display for AdvisoryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryWarning::SystemMessageOutOfPlace { position } => write!(
                f,
                "system message at position {} is not part of the leading system messages",
                position
            ),
            AdvisoryWarning::NameOnNonSystem { position, role } => write!(
                f,
                "message at position {} has a name but role '{}'",
                position,
                role.as_str()
            ),
            AdvisoryWarning::OrphanedToolResult {
                position,
                tool_call_id,
            } => write!(
                f,
                "tool result at position {} references unknown tool call {}",
                position,
                tool_call_id.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

/// Inspect a message list and collect every advisory finding
pub fn check_messages(messages: &[Message]) -> Vec<AdvisoryWarning> {
    let mut warnings = Vec::new();
    let mut in_leading_system_run = true;
    let mut known_call_ids: HashSet<&str> = HashSet::new();

    for (position, message) in messages.iter().enumerate() {
        if message.role == MessageRole::System {
            if !in_leading_system_run {
                warnings.push(AdvisoryWarning::SystemMessageOutOfPlace { position });
            }
        } else {
            in_leading_system_run = false;
        }

        if message.name.is_some() && message.role != MessageRole::System {
            warnings.push(AdvisoryWarning::NameOnNonSystem {
                position,
                role: message.role,
            });
        }

        match message.role {
            MessageRole::Assistant => {
                let ids = message.tool_calls.iter().flatten().filter_map(|c| c.id.as_deref());
                known_call_ids.extend(ids);
            }
            MessageRole::Tool => {
                let linked = message
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| known_call_ids.contains(id));
                if !linked {
                    warnings.push(AdvisoryWarning::OrphanedToolResult {
                        position,
                        tool_call_id: message.tool_call_id.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    warnings
}

/// Check a message list and log each finding at warn level
pub fn check_and_log(messages: &[Message]) -> Vec<AdvisoryWarning> {
    let warnings = check_messages(messages);
    for warning in &warnings {
        warn!("Advisory: {}", warning);
    }
    warnings
}
