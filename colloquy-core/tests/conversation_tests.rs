//! End-to-end conversation behavior: budgets, eviction, and response folding

use colloquy_core::config::ConversationConfig;
use colloquy_core::conversation::{ConversationState, EvictionPolicy};
use colloquy_core::protocol::{
    ChatResponse, ContentPart, ImageDetail, Message, MessageContent, MessageRole,
};
use colloquy_core::tokens::{estimate_tokens, HeuristicEstimator, TokenEstimator};
use proptest::prelude::*;
use serde_json::json;

fn budget(ceiling: usize, margin: usize) -> ConversationConfig {
    ConversationConfig {
        max_context_tokens: ceiling,
        token_margin: margin,
        ..Default::default()
    }
}

/// Stand-in for the remote service: echoes the last request message
fn echo(request_body: &serde_json::Value) -> ChatResponse {
    let last = request_body["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .cloned()
        .unwrap();
    serde_json::from_value(json!({
        "choices": [{
            "finish_reason": "stop",
            "message": { "role": "assistant", "content": last["content"] }
        }]
    }))
    .unwrap()
}

#[test]
fn test_build_then_echo_ends_with_assistant() {
    let mut state = ConversationState::new(ConversationConfig {
        system_prompt: "Answer briefly.".to_string(),
        ..Default::default()
    });
    state.append(MessageRole::User, "What is Rust?");

    let body = serde_json::to_value(state.build_request().unwrap()).unwrap();
    assert_eq!(body["messages"][0]["role"], json!("system"));

    let outcome = state.apply_response(&echo(&body)).unwrap();
    assert_eq!(state.last_message().unwrap().role, MessageRole::Assistant);
    assert_eq!(outcome.message.content.as_text(), Some("What is Rust?"));
}

#[test]
fn test_length_finish_forces_eviction() {
    let mut state = ConversationState::new(budget(4096, 512));
    for text in ["one", "two", "three", "four", "five", "six", "seven"] {
        state.append(MessageRole::User, text);
    }

    let response: ChatResponse = serde_json::from_value(json!({
        "choices": [{
            "finish_reason": "length",
            "message": { "role": "assistant", "content": "cut off mid" }
        }],
        "usage": { "prompt_tokens": 40, "completion_tokens": 10, "total_tokens": 50 }
    }))
    .unwrap();

    let outcome = state.apply_response(&response).unwrap();
    assert_eq!(outcome.evicted, 2);
    assert_eq!(state.len(), 6);
    assert_eq!(state.total_tokens(), 50);
    assert_eq!(state.messages()[0].content.as_text(), Some("three"));
}

#[test]
fn test_remote_error_leaves_history() {
    let mut state = ConversationState::new(budget(4096, 512));
    state.append(MessageRole::User, "hello");

    let response: ChatResponse =
        serde_json::from_value(json!({ "error": { "message": "overloaded" } })).unwrap();
    let err = state.apply_response(&response).unwrap_err();

    assert_eq!(err.remote_payload(), Some(&json!({ "message": "overloaded" })));
    assert_eq!(state.len(), 1);
}

#[test]
fn test_image_parts_count_fixed_costs() {
    let mut state = ConversationState::new(budget(4096, 512));
    let content = MessageContent::try_from(vec![
        ContentPart::text("describe these"),
        ContentPart::image("https://example.com/a.png", ImageDetail::Low),
        ContentPart::image("https://example.com/b.png", ImageDetail::High),
    ])
    .unwrap();

    state.append(MessageRole::User, content.clone());
    assert_eq!(state.total_tokens(), estimate_tokens(&content));
    assert_eq!(state.total_tokens(), 3 + 65 + 260);
}

#[test]
fn test_empty_parts_rejected() {
    assert!(MessageContent::try_from(Vec::<ContentPart>::new()).is_err());
}

#[test]
fn test_persisted_empty_parts_refused() {
    let persisted = r#"[{"role":"user","content":"hi"},{"role":"user","content":[]}]"#;
    assert!(serde_json::from_str::<Vec<Message>>(persisted).is_err());
}

#[test]
fn test_restore_from_persisted_messages() {
    let history = vec![Message::user("abcdefgh"), Message::assistant("ijklmnop")];
    let persisted = serde_json::to_string(&history).unwrap();

    let mut state = ConversationState::new(budget(4096, 512));
    let restored: Vec<Message> = serde_json::from_str(&persisted).unwrap();
    assert_eq!(state.restore(restored), 4);
    assert_eq!(state.messages(), history.as_slice());
}

#[test]
fn test_advisories_do_not_block_requests() {
    let mut state = ConversationState::new(budget(4096, 512));
    state.append(MessageRole::User, "hi");
    state.append_message(Message::tool("call_missing", "42"));

    let advisories = state.advisories();
    assert_eq!(advisories.len(), 1);
    assert!(state.build_request().is_ok());
}

proptest! {
    #[test]
    fn prop_hard_eviction_count(len in 0usize..200) {
        let mut state = ConversationState::new(budget(1_000_000, 0));
        state.restore(vec![Message::user("x"); len]);

        let evicted = state.hard_evict();
        prop_assert_eq!(evicted, len.min((len / 4).max(2)));
        prop_assert_eq!(state.len(), len - evicted);
    }

    #[test]
    fn prop_crossing_margin_shrinks_history(
        texts in prop::collection::vec("[a-z]{1,80}", 1..40),
        ceiling in 20usize..400,
    ) {
        let margin = ceiling / 10;
        let policy = EvictionPolicy::new(ceiling, margin);
        let mut state = ConversationState::new(budget(ceiling, margin));

        for text in texts {
            let before = state.len();
            let total_before = state.total_tokens();
            let cost = HeuristicEstimator.estimate_text(&text);

            let evicted = state.append(MessageRole::User, text);

            if policy.is_over_budget(total_before + cost) {
                prop_assert!(evicted >= 1);
                prop_assert!(state.len() < before + 1);
            } else {
                prop_assert_eq!(evicted, 0);
                prop_assert_eq!(state.len(), before + 1);
            }
        }
    }
}
