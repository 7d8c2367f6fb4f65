//! One conversation bound to a transport

use crate::config::ConversationConfig;
use crate::conversation::{ConversationState, TurnOutcome};
use crate::error::{ChatError, ChatResult};
use crate::http::{RequestOptions, Transport, TransportError, TransportTarget};
use crate::protocol::{MessageContent, MessageRole};
use crate::streaming::{decode_stream, FrameStream, StreamAccumulator};
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

/// Drives append, build, send and reduce for a single conversation
///
/// `&mut self` on every call keeps one exchange in flight at a time.
#[derive(Debug)]
pub struct ChatSession<T: Transport> {
    state: ConversationState,
    transport: T,
    timeout: Option<Duration>,
}

impl<T: Transport> ChatSession<T> {
    pub fn new(config: ConversationConfig, transport: T) -> Self {
        Self::with_state(ConversationState::new(config), transport)
    }

    pub fn with_state(state: ConversationState, transport: T) -> Self {
        Self {
            state,
            transport,
            timeout: None,
        }
    }

    /// Bound each request by a total timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ConversationState {
        &mut self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_state(self) -> ConversationState {
        self.state
    }

    /// Append a message, send the history, and fold the complete response
    pub async fn send(
        &mut self,
        role: MessageRole,
        content: impl Into<MessageContent>,
    ) -> ChatResult<TurnOutcome> {
        self.state.append(role, content);
        let request = self.state.build_request()?.with_streaming(false);
        let target = self.target();
        debug!(request_id = %target.options.request_id, "Dispatching turn");

        let response = self.transport.complete(&request, &target).await?;
        self.state.apply_response(&response)
    }

    /// Append a message and open a streamed reply
    ///
    /// The returned frames are not committed; fold them with a
    /// [`StreamAccumulator`] and pass it to [`commit_stream`](Self::commit_stream).
    pub async fn send_streaming(
        &mut self,
        role: MessageRole,
        content: impl Into<MessageContent>,
    ) -> ChatResult<FrameStream> {
        self.state.append(role, content);
        let request = self.state.build_request()?.with_streaming(true);
        let target = self.target();
        debug!(request_id = %target.options.request_id, "Dispatching streamed turn");

        let body = self
            .transport
            .stream(&request, &target)
            .await
            .map_err(surface_remote)?;
        Ok(decode_stream(body))
    }

    /// Stream a reply to completion and commit it
    pub async fn send_streaming_collect(
        &mut self,
        role: MessageRole,
        content: impl Into<MessageContent>,
    ) -> ChatResult<TurnOutcome> {
        let mut frames = self.send_streaming(role, content).await?;
        let mut accumulator = StreamAccumulator::new();
        while let Some(frame) = frames.next().await {
            accumulator.push(&frame);
        }
        Ok(self.commit_stream(accumulator))
    }

    /// Fold an accumulated streamed turn into the state
    pub fn commit_stream(&mut self, accumulator: StreamAccumulator) -> TurnOutcome {
        self.state.commit_stream(accumulator)
    }

    fn target(&self) -> TransportTarget {
        let mut options = RequestOptions::new();
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        TransportTarget::from_config(self.state.config()).with_options(options)
    }
}

/// Error payloads on a failed stream open surface like complete-call errors
fn surface_remote(error: TransportError) -> ChatError {
    match error.remote_payload() {
        Some(payload) => ChatError::Remote { payload },
        None => error.into(),
    }
}
