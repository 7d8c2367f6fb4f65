//! HTTP transport for chat completion calls
//!
//! This module handles:
//! - The [`Transport`] seam the session talks to
//! - Per-request options (request ID correlation, timeout)
//! - A pooled reqwest implementation in [`HttpClient`]

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::{map_http_error, map_reqwest_error, TransportError, TransportResult};

use crate::config::{ConversationConfig, SecretString};
use crate::protocol::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use uuid::Uuid;

/// Raw body chunks of a streaming response
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Options for a single request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Total request timeout, covering the whole body for streams.
    /// `None` leaves the call unbounded; callers compose their own deadlines.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// Create options with a fresh request ID
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Where and how to send one request
#[derive(Debug, Clone)]
pub struct TransportTarget {
    pub endpoint: String,
    pub api_key: SecretString,
    pub options: RequestOptions,
}

impl TransportTarget {
    pub fn new(endpoint: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            options: RequestOptions::new(),
        }
    }

    /// Target the configured endpoint with the configured credential
    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.endpoint.as_str(), config.api_key.clone())
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// Executes chat completion calls
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the complete response payload
    ///
    /// Error payloads from the service come back as `Ok` responses carrying
    /// an `error` field; only failures of the exchange itself are `Err`.
    async fn complete(
        &self,
        request: &ChatRequest,
        target: &TransportTarget,
    ) -> TransportResult<ChatResponse>;

    /// Send a request and return the raw streaming body
    async fn stream(
        &self,
        request: &ChatRequest,
        target: &TransportTarget,
    ) -> TransportResult<ByteStream>;
}
