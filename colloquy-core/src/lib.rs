//! Colloquy Core Library
//!
//! This crate keeps a token-budgeted conversation with a chat completion
//! endpoint: it estimates and evicts history to stay under a context ceiling,
//! builds request bodies, folds complete or streamed responses back into the
//! conversation, and decodes streamed bodies chunk by chunk.

pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod protocol;
pub mod request;
pub mod response;
pub mod session;
pub mod streaming;
pub mod tokens;

pub use config::{ConfigError, ConversationConfig, SecretString};
pub use conversation::{AdvisoryWarning, ConversationState, EvictionPolicy, TurnOutcome};
pub use error::{ChatError, ChatResult};
pub use http::{HttpClient, Transport, TransportError, TransportTarget};
pub use protocol::{ChatRequest, ChatResponse, Message, MessageContent, MessageRole, StreamFrame};
pub use session::ChatSession;
pub use streaming::{decode_stream, FrameDecoder, FrameStream, StreamAccumulator};
pub use tokens::{estimate_tokens, HeuristicEstimator, TokenEstimator};

/// Returns the version of the Colloquy Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
