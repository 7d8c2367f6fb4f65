//! HTTP client implementation using reqwest

use crate::http::error::{map_http_error, map_reqwest_error};
use crate::http::{ByteStream, Transport, TransportError, TransportResult, TransportTarget};
use crate::protocol::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Maximum response size (10MB)
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("colloquy/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> TransportResult<Self> {
        Self::with_config(Duration::from_secs(10), 10)
    }

    /// Create a new HTTP client with custom pooling and connect timeout
    ///
    /// No total request timeout is set here; a call is only bounded when its
    /// [`RequestOptions::timeout`](crate::http::RequestOptions) is set.
    pub fn with_config(connect_timeout: Duration, max_idle_per_host: usize) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    fn post(&self, request: &ChatRequest, target: &TransportTarget) -> RequestBuilder {
        let mut builder = self
            .client
            .post(&target.endpoint)
            .header("X-Request-ID", target.options.request_id.to_string())
            .json(request);

        if let Some(timeout) = target.options.timeout {
            builder = builder.timeout(timeout);
        }

        if !target.api_key.is_empty() {
            builder = builder.bearer_auth(target.api_key.expose_secret());
        }

        builder
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        target: &TransportTarget,
    ) -> TransportResult<Response> {
        let request_id = target.options.request_id;
        builder.send().await.map_err(|e| {
            let mapped = map_reqwest_error(e, request_id);
            error!(endpoint = %target.endpoint, %request_id, error = %mapped, "Request failed");
            mapped
        })
    }

    /// Reject responses that announce a body over the limit
    fn check_content_length(&self, response: &Response, request_id: Uuid) -> TransportResult<()> {
        match response.content_length() {
            Some(length) if length as usize > self.max_response_size => {
                Err(TransportError::ResponseTooLarge {
                    size: length as usize,
                    limit: self.max_response_size,
                    request_id,
                })
            }
            _ => Ok(()),
        }
    }

    fn validate_content_type(response: &Response, request_id: Uuid) -> TransportResult<()> {
        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or("").to_lowercase();
            if !content_type.contains("application/json") {
                return Err(TransportError::Decode {
                    message: format!("Expected application/json, got: {}", content_type),
                    request_id,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn complete(
        &self,
        request: &ChatRequest,
        target: &TransportTarget,
    ) -> TransportResult<ChatResponse> {
        let request_id = target.options.request_id;
        info!(
            endpoint = %target.endpoint,
            model = %request.model,
            %request_id,
            "Sending chat completion request"
        );

        let response = self.send(self.post(request, target), target).await?;
        let status = response.status();
        debug!(%status, %request_id, "Response status");

        self.check_content_length(&response, request_id)?;
        if status.is_success() {
            Self::validate_content_type(&response, request_id)?;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, request_id))?;
        if body.len() > self.max_response_size {
            return Err(TransportError::ResponseTooLarge {
                size: body.len(),
                limit: self.max_response_size,
                request_id,
            });
        }

        if !status.is_success() {
            // JSON error payloads are handed back so the reducer can surface them
            if let Ok(payload) = serde_json::from_slice::<ChatResponse>(&body) {
                if payload.error.is_some() {
                    warn!(%status, %request_id, "Service returned an error payload");
                    return Ok(payload);
                }
            }
            warn!(%status, %request_id, "Request failed");
            let text = String::from_utf8_lossy(&body).into_owned();
            return Err(map_http_error(status, Some(text), request_id));
        }

        let payload: ChatResponse = serde_json::from_slice(&body).map_err(|e| {
            error!(%request_id, error = %e, "Failed to parse response");
            TransportError::Decode {
                message: e.to_string(),
                request_id,
            }
        })?;

        info!(%request_id, "Request completed");
        Ok(payload)
    }

    async fn stream(
        &self,
        request: &ChatRequest,
        target: &TransportTarget,
    ) -> TransportResult<ByteStream> {
        let request_id = target.options.request_id;
        info!(
            endpoint = %target.endpoint,
            model = %request.model,
            %request_id,
            "Opening chat completion stream"
        );

        let builder = self.post(request, target).header(ACCEPT, "text/event-stream");
        let response = self.send(builder, target).await?;
        let status = response.status();
        debug!(%status, %request_id, "Stream response status");

        if !status.is_success() {
            warn!(%status, %request_id, "Stream request failed");
            let body = response.text().await.ok();
            return Err(map_http_error(status, body, request_id));
        }

        let limit = self.max_response_size;
        let mut received = 0usize;
        let chunks = response.bytes_stream().map(move |chunk| {
            let chunk = chunk.map_err(|e| map_reqwest_error(e, request_id))?;
            received += chunk.len();
            if received > limit {
                return Err(TransportError::ResponseTooLarge {
                    size: received,
                    limit,
                    request_id,
                });
            }
            Ok(chunk)
        });

        Ok(chunks.boxed())
    }
}
