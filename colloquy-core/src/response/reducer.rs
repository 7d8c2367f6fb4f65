//! Folding remote responses into conversation state

use crate::conversation::{ConversationState, TurnOutcome};
use crate::error::{ChatError, ChatResult};
use crate::protocol::{ChatResponse, Message};
use crate::streaming::StreamAccumulator;
use tracing::{info, warn};

/// Finish reason signalling the generation was cut for space
pub const FINISH_REASON_LENGTH: &str = "length";

/// Fold one complete response into the state
///
/// An `error` field fails the call with the payload verbatim and leaves the
/// state untouched. Otherwise the reported total usage replaces the running
/// total, the assistant message is appended (or a placeholder when the
/// response carries neither text nor tool calls), and eviction runs: forced
/// when the turn stopped for length, the soft check otherwise.
pub fn reduce_response(
    state: &mut ConversationState,
    response: &ChatResponse,
) -> ChatResult<TurnOutcome> {
    if let Some(error) = &response.error {
        warn!(error = %error, "Remote service returned an error payload");
        return Err(ChatError::Remote {
            payload: error.clone(),
        });
    }

    let choice = response.first_choice();
    let finish_reason = choice.and_then(|c| c.finish_reason.clone());

    let message = match choice.and_then(|c| c.message.as_ref()) {
        Some(message) if !message.content.is_empty() || message.has_tool_calls() => message.clone(),
        _ => placeholder_for(response),
    };

    match response.total_tokens() {
        Some(total) => state.set_authoritative_total(total as usize),
        None => {
            let cost = state.estimator().estimate_message(&message);
            state.add_tokens(cost);
        }
    }
    state.push_uncounted(message.clone());

    let evicted = settle_budget(state, finish_reason.as_deref());

    Ok(TurnOutcome {
        message,
        finish_reason,
        evicted,
    })
}

/// Fold an accumulated streamed turn into the state
///
/// Streams carry no authoritative usage unless the final frame reports it,
/// so the estimate of the assembled message is added when usage is absent.
pub fn commit_streamed_turn(
    state: &mut ConversationState,
    accumulator: StreamAccumulator,
) -> TurnOutcome {
    let finish_reason = accumulator.finish_reason().map(str::to_string);
    let usage = accumulator.usage();
    let frames = accumulator.frame_count();

    let message = if accumulator.is_empty() {
        Message::assistant(format!("[empty stream: {} frames, no content]", frames))
    } else {
        accumulator.into_message()
    };

    match usage.and_then(|u| u.total_tokens) {
        Some(total) => state.set_authoritative_total(total as usize),
        None => {
            let cost = state.estimator().estimate_message(&message);
            state.add_tokens(cost);
        }
    }
    state.push_uncounted(message.clone());

    let evicted = settle_budget(state, finish_reason.as_deref());

    TurnOutcome {
        message,
        finish_reason,
        evicted,
    }
}

fn settle_budget(state: &mut ConversationState, finish_reason: Option<&str>) -> usize {
    if finish_reason == Some(FINISH_REASON_LENGTH) {
        info!("Generation truncated for length; forcing eviction");
        state.hard_evict()
    } else {
        state.check_budget()
    }
}

/// Visible stand-in for a response with nothing to show
fn placeholder_for(response: &ChatResponse) -> Message {
    let raw = serde_json::to_string(response).unwrap_or_else(|e| format!("<unserializable: {}>", e));
    warn!(payload = %raw, "Response carried no text or tool calls");
    Message::assistant(format!("[empty response] {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversationConfig;
    use crate::protocol::{MessageRole, StreamFrame};

    fn state(ceiling: usize, margin: usize) -> ConversationState {
        ConversationState::new(ConversationConfig {
            max_context_tokens: ceiling,
            token_margin: margin,
            ..Default::default()
        })
    }

    fn parse(json: &str) -> ChatResponse {
        serde_json::from_str(json).unwrap()
    }

    fn accumulate(frames: &[&str]) -> StreamAccumulator {
        let mut accumulator = StreamAccumulator::new();
        for json in frames {
            let frame: StreamFrame = serde_json::from_str(json).unwrap();
            accumulator.push(&frame);
        }
        accumulator
    }

    #[test]
    fn test_error_payload_leaves_state_untouched() {
        let mut state = state(1000, 10);
        state.append(MessageRole::User, "hello world");
        let before = state.total_tokens();

        let response = parse(r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#);
        let err = reduce_response(&mut state, &response).unwrap_err();

        assert_eq!(
            err.remote_payload().unwrap()["message"],
            serde_json::json!("bad key")
        );
        assert_eq!(state.len(), 1);
        assert_eq!(state.total_tokens(), before);
    }

    #[test]
    fn test_length_forces_eviction_and_overwrites_total() {
        let mut state = state(10_000, 10);
        for _ in 0..3 {
            state.append(MessageRole::User, "hi");
        }

        let response = parse(
            r#"{"choices":[{"finish_reason":"length","message":{"role":"assistant","content":"hi"}}],"usage":{"total_tokens":50}}"#,
        );
        let outcome = reduce_response(&mut state, &response).unwrap();

        assert_eq!(outcome.evicted, 2);
        assert_eq!(outcome.finish_reason.as_deref(), Some("length"));
        assert_eq!(state.total_tokens(), 50);
        assert_eq!(state.len(), 2);
        assert_eq!(state.last_message().unwrap().role, MessageRole::Assistant);
    }

    #[test]
    fn test_stop_runs_soft_check_only() {
        let mut state = state(10_000, 10);
        state.append(MessageRole::User, "hi");
        let response = parse(
            r#"{"choices":[{"finish_reason":"stop","message":{"role":"assistant","content":"hello"}}],"usage":{"total_tokens":12}}"#,
        );
        let outcome = reduce_response(&mut state, &response).unwrap();
        assert_eq!(outcome.evicted, 0);
        assert_eq!(state.len(), 2);
        assert_eq!(state.total_tokens(), 12);
    }

    #[test]
    fn test_reported_usage_over_budget_evicts() {
        let mut state = state(100, 10);
        state.append(MessageRole::User, "hi");
        state.append(MessageRole::Assistant, "hello");
        state.append(MessageRole::User, "more");
        let response = parse(
            r#"{"choices":[{"finish_reason":"stop","message":{"role":"assistant","content":"ok"}}],"usage":{"total_tokens":95}}"#,
        );
        let outcome = reduce_response(&mut state, &response).unwrap();
        assert_eq!(outcome.evicted, 2);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_empty_content_becomes_placeholder() {
        let mut state = state(10_000, 10);
        let response = parse(
            r#"{"id":"chatcmpl-9","choices":[{"finish_reason":"stop","message":{"role":"assistant","content":""}}],"usage":{"total_tokens":7}}"#,
        );
        let outcome = reduce_response(&mut state, &response).unwrap();
        let text = outcome.message.content.as_text().unwrap();
        assert!(text.starts_with("[empty response]"));
        assert!(text.contains("chatcmpl-9"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_missing_choices_become_placeholder() {
        let mut state = state(10_000, 10);
        let outcome = reduce_response(&mut state, &parse("{}")).unwrap();
        assert_eq!(outcome.message.role, MessageRole::Assistant);
        assert!(outcome.message.content.as_text().unwrap().contains("[empty response]"));
    }

    #[test]
    fn test_tool_call_only_message_kept() {
        let mut state = state(10_000, 10);
        let response = parse(
            r#"{"choices":[{"finish_reason":"tool_calls","message":{"role":"assistant","content":null,"tool_calls":[{"id":"call_1","type":"function","function":{"name":"lookup","arguments":"{\"q\":\"rust\"}"}}]}}],"usage":{"total_tokens":30}}"#,
        );
        let outcome = reduce_response(&mut state, &response).unwrap();
        assert!(outcome.message.has_tool_calls());
        assert_eq!(
            outcome.message.tool_calls.as_ref().unwrap()[0].function.arguments,
            "{\"q\":\"rust\"}"
        );
    }

    #[test]
    fn test_missing_usage_adds_estimate() {
        let mut state = state(10_000, 10);
        state.append(MessageRole::User, "abcdefgh");
        let response = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":"abcdefghijkl"}}]}"#,
        );
        reduce_response(&mut state, &response).unwrap();
        assert_eq!(state.total_tokens(), 2 + 3);
    }

    #[test]
    fn test_streamed_length_forces_eviction_and_overwrites_total() {
        let mut state = state(10_000, 10);
        for _ in 0..3 {
            state.append(MessageRole::User, "hi");
        }

        let accumulator = accumulate(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"h"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"i"},"finish_reason":"length"}],"usage":{"total_tokens":50}}"#,
        ]);
        let outcome = commit_streamed_turn(&mut state, accumulator);

        assert_eq!(outcome.message.content.as_text(), Some("hi"));
        assert_eq!(outcome.finish_reason.as_deref(), Some("length"));
        assert_eq!(outcome.evicted, 2);
        assert_eq!(state.len(), 2);
        assert_eq!(state.total_tokens(), 50);
    }

    #[test]
    fn test_streamed_usage_replaces_total() {
        let mut state = state(10_000, 10);
        state.append(MessageRole::User, "abcdefghijkl");

        let accumulator = accumulate(&[
            r#"{"choices":[{"index":0,"delta":{"content":"done"},"finish_reason":"stop"}],"usage":{"total_tokens":42}}"#,
        ]);
        let outcome = commit_streamed_turn(&mut state, accumulator);

        assert_eq!(outcome.evicted, 0);
        assert_eq!(state.len(), 2);
        assert_eq!(state.total_tokens(), 42);
    }

    #[test]
    fn test_streamed_without_usage_adds_estimate() {
        let mut state = state(10_000, 10);
        state.append(MessageRole::User, "abcdefgh");

        let accumulator = accumulate(&[
            r#"{"choices":[{"index":0,"delta":{"content":"abcdef"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"ghijkl"},"finish_reason":"stop"}]}"#,
        ]);
        commit_streamed_turn(&mut state, accumulator);

        assert_eq!(state.total_tokens(), 2 + 3);
    }

    #[test]
    fn test_empty_stream_commits_placeholder() {
        let mut state = state(10_000, 10);
        let outcome = commit_streamed_turn(&mut state, StreamAccumulator::new());

        assert_eq!(
            outcome.message.content.as_text(),
            Some("[empty stream: 0 frames, no content]")
        );
        assert_eq!(outcome.message.role, MessageRole::Assistant);
        assert_eq!(outcome.finish_reason, None);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_contentless_frames_counted_in_placeholder() {
        let mut state = state(10_000, 10);
        let accumulator = accumulate(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        ]);
        let outcome = commit_streamed_turn(&mut state, accumulator);

        assert_eq!(
            outcome.message.content.as_text(),
            Some("[empty stream: 2 frames, no content]")
        );
        assert_eq!(outcome.finish_reason.as_deref(), Some("stop"));
    }
}
