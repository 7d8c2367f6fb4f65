//! Transport error type and HTTP error mapping

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Result type for transport calls
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures of the exchange with the remote service
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {message} [request_id: {request_id}]")]
    Network { message: String, request_id: Uuid },

    #[error("Request timed out [request_id: {request_id}]")]
    Timeout { request_id: Uuid },

    /// Non-success status whose body is not an error payload
    #[error("HTTP {status}: {message} [request_id: {request_id}]")]
    Status {
        status: u16,
        message: String,
        body: String,
        request_id: Uuid,
    },

    #[error("Response size {size} exceeds maximum {limit} [request_id: {request_id}]")]
    ResponseTooLarge {
        size: usize,
        limit: usize,
        request_id: Uuid,
    },

    #[error("Invalid response: {message} [request_id: {request_id}]")]
    Decode { message: String, request_id: Uuid },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// The `error` object of a JSON status body, if the service sent one
    pub fn remote_payload(&self) -> Option<Value> {
        match self {
            TransportError::Status { body, .. } => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|json| json.get("error").cloned()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Map a non-success status and its body to a transport error
pub fn map_http_error(status: StatusCode, body: Option<String>, request_id: Uuid) -> TransportError {
    if matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT
    ) {
        return TransportError::Timeout { request_id };
    }

    let body = body.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        });

    TransportError::Status {
        status: status.as_u16(),
        message,
        body,
        request_id,
    }
}

/// Map a reqwest failure to a transport error
pub fn map_reqwest_error(error: reqwest::Error, request_id: Uuid) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout { request_id }
    } else if error.is_connect() {
        TransportError::Network {
            message: format!("Connection failed: {}", error),
            request_id,
        }
    } else if error.is_decode() {
        TransportError::Decode {
            message: error.to_string(),
            request_id,
        }
    } else {
        TransportError::Network {
            message: error.to_string(),
            request_id,
        }
    }
}

/// Pull a human readable message out of a JSON error body
fn extract_error_message(json: &Value) -> Option<String> {
    // { "error": { "message": "..." } }
    if let Some(message) = json
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    // { "message": "..." }
    if let Some(message) = json.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    // { "error": "..." }
    json.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_statuses() {
        let id = Uuid::new_v4();
        assert!(map_http_error(StatusCode::GATEWAY_TIMEOUT, None, id).is_timeout());
        assert!(map_http_error(StatusCode::REQUEST_TIMEOUT, None, id).is_timeout());
    }

    #[test]
    fn test_status_message_from_json_body() {
        let body = r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        let err = map_http_error(StatusCode::NOT_FOUND, Some(body.to_string()), Uuid::new_v4());
        match &err {
            TransportError::Status {
                status, message, ..
            } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "model not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            err.remote_payload().unwrap()["type"],
            serde_json::json!("invalid_request_error")
        );
    }

    #[test]
    fn test_status_message_from_plain_body() {
        let err = map_http_error(
            StatusCode::BAD_GATEWAY,
            Some("upstream down\n".to_string()),
            Uuid::new_v4(),
        );
        assert!(err.to_string().contains("HTTP 502: upstream down"));
        assert!(err.remote_payload().is_none());
    }

    #[test]
    fn test_status_without_body_uses_reason() {
        let err = map_http_error(StatusCode::SERVICE_UNAVAILABLE, None, Uuid::new_v4());
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn test_generic_message_formats() {
        let json = serde_json::json!({ "message": "slow down" });
        assert_eq!(extract_error_message(&json).as_deref(), Some("slow down"));
        let json = serde_json::json!({ "error": "bad" });
        assert_eq!(extract_error_message(&json).as_deref(), Some("bad"));
        assert_eq!(extract_error_message(&serde_json::json!({})), None);
    }
}
