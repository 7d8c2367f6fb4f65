//! Environment variable interpolation for configuration files

use super::error::ConfigError;
use super::schema::ConversationConfig;
use super::secrets::SecretString;
use regex::Regex;
use std::env;
use std::sync::LazyLock;

pub(super) static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern"));

/// Interpolate environment variables in a configuration string
///
/// Fails on the first referenced variable that is not set.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut missing_vars = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(content, |cap: &regex::Captures<'_>| {
        match env::var(&cap[1]) {
            Ok(value) => value,
            Err(_) => {
                missing_vars.push(cap[1].to_string());
                cap[0].to_string()
            }
        }
    });

    if let Some(var) = missing_vars.into_iter().next() {
        return Err(ConfigError::EnvVarNotFound { var });
    }

    Ok(result.into_owned())
}

/// Interpolate the fields of a loaded config that commonly carry placeholders
///
/// Covers values that reached the struct without passing through
/// [`interpolate_env_vars`], e.g. configs built in code.
pub fn interpolate_config_env_vars(config: &mut ConversationConfig) -> Result<(), ConfigError> {
    let api_key = config.api_key.expose_secret();
    if ENV_VAR_PATTERN.is_match(api_key) {
        config.api_key = SecretString::new(interpolate_env_vars(api_key)?);
    }

    if ENV_VAR_PATTERN.is_match(&config.endpoint) {
        config.endpoint = interpolate_env_vars(&config.endpoint)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars() {
        env::set_var("COLLOQUY_TEST_VAR", "test_value");

        let content = "api_key: ${COLLOQUY_TEST_VAR}";
        let result = interpolate_env_vars(content).unwrap();
        assert_eq!(result, "api_key: test_value");

        env::remove_var("COLLOQUY_TEST_VAR");
    }

    #[test]
    fn test_missing_env_var() {
        let content = "api_key: ${COLLOQUY_MISSING_VAR}";
        let result = interpolate_env_vars(content);

        if let Err(ConfigError::EnvVarNotFound { var }) = result {
            assert_eq!(var, "COLLOQUY_MISSING_VAR");
        } else {
            panic!("Expected EnvVarNotFound error");
        }
    }

    #[test]
    fn test_config_fields_interpolated() {
        env::set_var("COLLOQUY_TEST_KEY", "sk-from-env");
        env::set_var("COLLOQUY_TEST_HOST", "localhost:8080");

        let mut config = ConversationConfig {
            api_key: SecretString::new("${COLLOQUY_TEST_KEY}"),
            endpoint: "http://${COLLOQUY_TEST_HOST}/v1/chat/completions".to_string(),
            ..Default::default()
        };
        interpolate_config_env_vars(&mut config).unwrap();

        assert_eq!(config.api_key.expose_secret(), "sk-from-env");
        assert_eq!(config.endpoint, "http://localhost:8080/v1/chat/completions");

        env::remove_var("COLLOQUY_TEST_KEY");
        env::remove_var("COLLOQUY_TEST_HOST");
    }
}
