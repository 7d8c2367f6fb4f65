//! Conversation state: history, running token total, and configuration

use super::advisory::{self, AdvisoryWarning};
use super::eviction::EvictionPolicy;
use crate::config::{ConfigResult, ConversationConfig, SafeLogging};
use crate::error::ChatResult;
use crate::protocol::{ChatRequest, ChatResponse, Message, MessageContent, MessageRole};
use crate::streaming::StreamAccumulator;
use crate::tokens::{HeuristicEstimator, TokenEstimator};
use crate::{request, response};
use tracing::{debug, info};

/// Result of folding one assistant turn into the state
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The assistant message that was appended
    pub message: Message,
    /// Terminal reason reported for the turn
    pub finish_reason: Option<String>,
    /// Number of messages evicted while folding the turn
    pub evicted: usize,
}

/// Per-session conversation aggregate
///
/// The message list and the running token total only change together, inside
/// `&mut self` methods, so no caller can observe one without the other.
#[derive(Debug)]
pub struct ConversationState {
    config: ConversationConfig,
    messages: Vec<Message>,
    total_tokens: usize,
    estimator: Box<dyn TokenEstimator>,
}

impl ConversationState {
    /// Create an empty conversation using the default heuristic estimator
    pub fn new(config: ConversationConfig) -> Self {
        Self::with_estimator(config, HeuristicEstimator)
    }

    /// Create an empty conversation with a custom estimator
    pub fn with_estimator(
        config: ConversationConfig,
        estimator: impl TokenEstimator + 'static,
    ) -> Self {
        debug!(config = %config.safe_for_logging(), "Creating conversation state");
        Self {
            config,
            messages: Vec::new(),
            total_tokens: 0,
            estimator: Box::new(estimator),
        }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Replace the system prompt; history is untouched
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.config.system_prompt = prompt.into();
    }

    /// Replace the serialized tool descriptor list
    pub fn set_tools(&mut self, tools: impl Into<String>) {
        self.config.tools = tools.into();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Running token total (estimated, or authoritative after a response)
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn policy(&self) -> EvictionPolicy {
        EvictionPolicy::from_config(&self.config)
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Append a message built from role and content
    ///
    /// Returns the number of messages evicted by the budget check that follows.
    pub fn append(&mut self, role: MessageRole, content: impl Into<MessageContent>) -> usize {
        self.append_message(Message::new(role, content))
    }

    /// Append a pre-built message, count it, then run the soft budget check
    pub fn append_message(&mut self, message: Message) -> usize {
        let cost = self.estimator.estimate_message(&message);
        self.messages.push(message);
        self.total_tokens = self.total_tokens.saturating_add(cost);
        debug!(cost, total_tokens = self.total_tokens, "Appended message");
        self.check_budget()
    }

    /// Soft check: evict when the total plus margin reaches the ceiling
    pub fn check_budget(&mut self) -> usize {
        if self.policy().is_over_budget(self.total_tokens) {
            self.hard_evict()
        } else {
            0
        }
    }

    /// Drop the oldest quarter of the history (at least two messages)
    ///
    /// The running total is left as is; it is corrected by the next
    /// authoritative usage report or by [`recount_tokens`](Self::recount_tokens).
    pub fn hard_evict(&mut self) -> usize {
        let count = EvictionPolicy::eviction_count(self.messages.len());
        self.messages.drain(..count);
        info!(
            evicted = count,
            remaining = self.messages.len(),
            total_tokens = self.total_tokens,
            "Evicted oldest messages"
        );
        count
    }

    /// Remove every message; system prompt and configuration are kept
    pub fn clear(&mut self) {
        self.messages.clear();
        self.total_tokens = 0;
    }

    /// Replace the history with previously persisted messages and rescan
    pub fn restore(&mut self, messages: Vec<Message>) -> usize {
        self.messages = messages;
        self.recount_tokens()
    }

    /// Recompute the running total from the current history
    pub fn recount_tokens(&mut self) -> usize {
        self.total_tokens = self
            .messages
            .iter()
            .map(|message| self.estimator.estimate_message(message))
            .sum();
        self.total_tokens
    }

    /// Run the advisory checks over the history; findings are logged
    pub fn advisories(&self) -> Vec<AdvisoryWarning> {
        advisory::check_and_log(&self.messages)
    }

    /// One-line budget summary for diagnostics collaborators
    pub fn diagnostics(&self) -> String {
        format!(
            "tokens: {}/{} (margin {}), messages: {}",
            self.total_tokens,
            self.config.max_context_tokens,
            self.config.token_margin,
            self.messages.len()
        )
    }

    /// Assemble the outbound request body
    pub fn build_request(&self) -> ConfigResult<ChatRequest> {
        request::build_request(self)
    }

    /// Fold a complete response into the state
    pub fn apply_response(&mut self, response: &ChatResponse) -> ChatResult<TurnOutcome> {
        response::reduce_response(self, response)
    }

    /// Fold an accumulated streamed turn into the state
    pub fn commit_stream(&mut self, accumulator: StreamAccumulator) -> TurnOutcome {
        response::commit_streamed_turn(self, accumulator)
    }

    /// Overwrite the running total with a count reported by the remote service
    pub(crate) fn set_authoritative_total(&mut self, total_tokens: usize) {
        debug!(
            estimated = self.total_tokens,
            authoritative = total_tokens,
            "Applying reported token usage"
        );
        self.total_tokens = total_tokens;
    }

    /// Add to the running total without touching the history
    pub(crate) fn add_tokens(&mut self, tokens: usize) {
        self.total_tokens = self.total_tokens.saturating_add(tokens);
    }

    /// Push a message whose cost is already reflected in the total
    pub(crate) fn push_uncounted(&mut self, message: Message) {
        self.messages.push(message);
    }
}
