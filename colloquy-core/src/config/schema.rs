//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::{SafeLogging, SecretString};
use serde::{Deserialize, Serialize};

/// Configuration surface of one conversation
///
/// Every field has a default so partial files load; seeding those defaults
/// from the environment is left to the embedding application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Bearer credential (supports environment variable interpolation)
    #[serde(default)]
    pub api_key: SecretString,

    /// System prompt prepended to every request when non-blank
    #[serde(default)]
    pub system_prompt: String,

    /// Full URL of the chat completion endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Hard ceiling for the conversation's token total
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Generation cap sent as `max_tokens`
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Whether the generation cap is sent
    #[serde(default)]
    pub max_tokens_enabled: bool,

    /// Slack below the ceiling at which eviction starts
    #[serde(default = "default_token_margin")]
    pub token_margin: usize,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Whether temperature is sent
    #[serde(default = "default_true")]
    pub temperature_enabled: bool,

    /// Nucleus sampling parameter
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Whether top_p is sent
    #[serde(default)]
    pub top_p_enabled: bool,

    /// Frequency penalty, always sent
    #[serde(default)]
    pub frequency_penalty: f32,

    /// Presence penalty, always sent
    #[serde(default)]
    pub presence_penalty: f32,

    /// Request a JSON object response
    #[serde(default)]
    pub json_mode: bool,

    /// Serialized tool descriptor list (JSON array); blank means no tools
    #[serde(default)]
    pub tools: String,

    /// Whether responses are streamed
    #[serde(default = "default_true")]
    pub stream: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::default(),
            system_prompt: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_context_tokens: default_max_context_tokens(),
            max_tokens: default_max_tokens(),
            max_tokens_enabled: false,
            token_margin: default_token_margin(),
            temperature: default_temperature(),
            temperature_enabled: true,
            top_p: default_top_p(),
            top_p_enabled: false,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            json_mode: false,
            tools: String::new(),
            stream: true,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_max_context_tokens() -> usize { 4096 }
fn default_max_tokens() -> u32 { 1024 }
fn default_token_margin() -> usize { 512 }
fn default_temperature() -> f32 { 0.7 }
fn default_top_p() -> f32 { 1.0 }

impl ConversationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::required("model")
                .with_context("A model identifier must be configured"));
        }

        if self.endpoint.is_empty() {
            return Err(ValidationError::required("endpoint"));
        }

        match url::Url::parse(&self.endpoint) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::new(
                        "endpoint",
                        ValidationErrorKind::InvalidUrl {
                            message: format!("URL scheme must be http or https, got: {}", url.scheme()),
                        },
                    ));
                }
            }
            Err(e) => {
                return Err(ValidationError::new(
                    "endpoint",
                    ValidationErrorKind::InvalidUrl {
                        message: e.to_string(),
                    },
                ));
            }
        }

        if self.max_context_tokens == 0 {
            return Err(ValidationError::out_of_range(
                "max_context_tokens",
                "Must be greater than 0",
            ));
        }

        if self.token_margin >= self.max_context_tokens {
            return Err(ValidationError::new(
                "token_margin",
                ValidationErrorKind::Incompatible {
                    message: "Must be smaller than max_context_tokens".to_string(),
                },
            ));
        }

        if self.max_tokens_enabled && self.max_tokens == 0 {
            return Err(ValidationError::out_of_range(
                "max_tokens",
                "Must be greater than 0 when enabled",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::out_of_range(
                "temperature",
                "Must be between 0.0 and 2.0",
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ValidationError::out_of_range(
                "top_p",
                "Must be between 0.0 and 1.0",
            ));
        }

        for (field, value) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(ValidationError::out_of_range(
                    field,
                    "Must be between -2.0 and 2.0",
                ));
            }
        }

        Ok(())
    }
}

impl SafeLogging for ConversationConfig {
    fn safe_for_logging(&self) -> String {
        format!(
            "model={} endpoint={} api_key={} ceiling={} margin={} stream={}",
            self.model,
            self.endpoint,
            self.api_key.partial_redact(),
            self.max_context_tokens,
            self.token_margin,
            self.stream,
        )
    }
}
