//! Conversation history under a token budget
//!
//! A [`ConversationState`] owns the ordered history and its running token
//! total. Every append is followed by a soft budget check; crossing
//! `ceiling - margin` triggers a hard eviction of the oldest messages.

pub mod advisory;
pub mod eviction;
mod state;

pub use advisory::AdvisoryWarning;
pub use eviction::EvictionPolicy;
pub use state::{ConversationState, TurnOutcome};
