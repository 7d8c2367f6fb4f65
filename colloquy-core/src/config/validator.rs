//! Configuration validation utilities

use super::env::ENV_VAR_PATTERN;
use super::error::ConfigError;
use super::schema::ConversationConfig;
use crate::request::parse_tool_schema;
use tracing::warn;

/// Configuration validator with additional validation rules
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    ///
    /// Field-level validation and the tool schema are fatal; budget and
    /// credential oddities are only logged.
    pub fn validate(&self, config: &ConversationConfig) -> Result<(), ConfigError> {
        // First run the built-in validation
        config.validate()?;

        self.validate_tools(config)?;
        self.check_generation_budget(config);
        self.check_api_key(config);

        Ok(())
    }

    /// The tool schema text must parse as a tool descriptor list
    fn validate_tools(&self, config: &ConversationConfig) -> Result<(), ConfigError> {
        parse_tool_schema(&config.tools).map(|_| ())
    }

    /// A generation cap at or above the ceiling leaves no room for history
    fn check_generation_budget(&self, config: &ConversationConfig) {
        if config.max_tokens_enabled && config.max_tokens as usize >= config.max_context_tokens {
            warn!(
                max_tokens = config.max_tokens,
                max_context_tokens = config.max_context_tokens,
                "Generation cap is not below the context ceiling"
            );
        }
    }

    fn check_api_key(&self, config: &ConversationConfig) {
        if let Some(var) = self.extract_env_vars(config.api_key.expose_secret()).first() {
            warn!(var = %var, "API key still contains an unresolved placeholder");
        }
    }

    /// Extract environment variable names from a string
    pub fn extract_env_vars(&self, text: &str) -> Vec<String> {
        ENV_VAR_PATTERN
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .collect()
    }
}
