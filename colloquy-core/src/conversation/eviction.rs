//! Sliding eviction policy

use crate::config::ConversationConfig;

/// Minimum number of messages a hard eviction removes
pub const MIN_EVICTION: usize = 2;

/// Decides when the history is over budget and how much to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Hard ceiling for the running total
    pub ceiling: usize,
    /// Slack reserved below the ceiling
    pub margin: usize,
}

impl EvictionPolicy {
    /// Create a policy from explicit budgets
    pub fn new(ceiling: usize, margin: usize) -> Self {
        Self { ceiling, margin }
    }

    /// Create a policy from a conversation config
    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.max_context_tokens, config.token_margin)
    }

    /// Soft check: the total plus margin has reached the ceiling
    pub fn is_over_budget(&self, total_tokens: usize) -> bool {
        total_tokens.saturating_add(self.margin) >= self.ceiling
    }

    /// Number of oldest messages a hard eviction drops from a history of `len`
    ///
    /// A quarter of the history, at least [`MIN_EVICTION`], never more than `len`.
    pub fn eviction_count(len: usize) -> usize {
        (len / 4).max(MIN_EVICTION).min(len)
    }
}
