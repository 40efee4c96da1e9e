//! Configuration for HttpBrain.

use std::env;
use std::path::Path;
use std::time::Duration;

use brain_core::BrainError;

/// Default system prompt file name.
pub const DEFAULT_PROMPT_FILE: &str = "SYSTEM_PROMPT.md";

/// Configuration for one HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpBrainConfig {
    /// Registry name of the provider.
    pub name: String,

    /// API root; `/v1/chat/completions` is appended.
    pub api_url: String,

    /// API key for authentication.
    pub api_key: String,

    /// Model name to use.
    pub model: String,

    /// Optional system prompt.
    pub system_prompt: Option<String>,

    /// Maximum tokens for response.
    pub max_tokens: Option<u32>,

    /// Temperature for generation (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Client-side request timeout.
    pub timeout: Duration,
}

impl Default for HttpBrainConfig {
    fn default() -> Self {
        Self {
            name: "grok".to_string(),
            api_url: "https://api.x.ai".to_string(),
            api_key: String::new(),
            model: "grok-4-1-fast".to_string(),
            system_prompt: None,
            max_tokens: Some(1024),
            temperature: Some(0.7),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpBrainConfig {
    /// Create configuration from environment variables under `prefix`.
    ///
    /// The provider is named after the lowercased prefix.
    ///
    /// Required environment variables:
    /// - `<PREFIX>_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `<PREFIX>_API_URL` - API URL (default: https://api.x.ai)
    /// - `<PREFIX>_MODEL` - Model name (default: grok-4-1-fast)
    /// - `<PREFIX>_SYSTEM_PROMPT` - System prompt (overrides prompt file)
    /// - `<PREFIX>_PROMPT_FILE` - Path to system prompt file (default: SYSTEM_PROMPT.md)
    /// - `<PREFIX>_MAX_TOKENS` - Max tokens (default: 1024)
    /// - `<PREFIX>_TEMPERATURE` - Temperature (default: 0.7)
    /// - `<PREFIX>_TIMEOUT_MS` - Client timeout (default: 30000)
    ///
    /// System prompt priority:
    /// 1. `<PREFIX>_SYSTEM_PROMPT` env var (if set)
    /// 2. Contents of prompt file (if exists)
    /// 3. None
    pub fn from_env(prefix: &str) -> Result<Self, BrainError> {
        let var = |suffix: &str| env::var(format!("{}_{}", prefix, suffix));
        let defaults = Self::default();

        let api_key = var("API_KEY")
            .map_err(|_| BrainError::Configuration(format!("{}_API_KEY not set", prefix)))?;

        let api_url = var("API_URL").unwrap_or(defaults.api_url);

        let model = var("MODEL").unwrap_or(defaults.model);

        // System prompt: env var takes precedence, then try loading from file
        let system_prompt = if let Ok(prompt) = var("SYSTEM_PROMPT") {
            Some(prompt)
        } else {
            let prompt_file = var("PROMPT_FILE").unwrap_or_else(|_| DEFAULT_PROMPT_FILE.to_string());
            load_prompt_file(&prompt_file)
        };

        let max_tokens = var("MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.max_tokens);

        let temperature = var("TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.temperature);

        let timeout = var("TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);

        Ok(Self {
            name: prefix.to_lowercase(),
            api_url,
            api_key,
            model,
            system_prompt,
            max_tokens,
            temperature,
            timeout,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> HttpBrainConfigBuilder {
        HttpBrainConfigBuilder::default()
    }
}

/// Builder for HttpBrainConfig.
#[derive(Debug, Default)]
pub struct HttpBrainConfigBuilder {
    config: HttpBrainConfig,
}

impl HttpBrainConfigBuilder {
    /// Set the provider name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    /// Set the client timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Load system prompt from a file.
    ///
    /// If the file exists and is non-empty, sets the system prompt.
    pub fn load_prompt_file(mut self, path: impl AsRef<Path>) -> Self {
        if let Some(prompt) = load_prompt_file(path) {
            self.config.system_prompt = Some(prompt);
        }
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpBrainConfig {
        self.config
    }
}

/// Load a prompt file, returning None if not found or empty.
fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    let content = std::fs::read_to_string(path.as_ref()).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpBrainConfig::default();

        assert_eq!(config.name, "grok");
        assert_eq!(config.api_url, "https://api.x.ai");
        assert!(config.api_key.is_empty());
        assert_eq!(config.model, "grok-4-1-fast");
        assert!(config.system_prompt.is_none());
        assert_eq!(config.max_tokens, Some(1024));
        assert_eq!(config.temperature, Some(0.7));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_all_options() {
        let config = HttpBrainConfig::builder()
            .name("openai")
            .api_key("my-key")
            .api_url("https://custom.api.com")
            .model("gpt-4o-mini")
            .system_prompt("You are helpful")
            .max_tokens(512)
            .temperature(0.5)
            .timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.name, "openai");
        assert_eq!(config.api_key, "my-key");
        assert_eq!(config.api_url, "https://custom.api.com");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.system_prompt, Some("You are helpful".to_string()));
        assert_eq!(config.max_tokens, Some(512));
        assert_eq!(config.temperature, Some(0.5));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_prompt_file() {
        assert!(load_prompt_file("/definitely/not/here.md").is_none());
    }

    // Environment-based tests are combined into a single test to avoid
    // race conditions when tests run in parallel (env vars are process-global).
    // A unique prefix keeps other tests' variables out of the way.
    #[test]
    fn test_from_env_scenarios() {
        const VARS: [&str; 8] = [
            "HTTPBRAINTEST_API_KEY",
            "HTTPBRAINTEST_API_URL",
            "HTTPBRAINTEST_MODEL",
            "HTTPBRAINTEST_SYSTEM_PROMPT",
            "HTTPBRAINTEST_PROMPT_FILE",
            "HTTPBRAINTEST_MAX_TOKENS",
            "HTTPBRAINTEST_TEMPERATURE",
            "HTTPBRAINTEST_TIMEOUT_MS",
        ];
        fn clear_all() {
            for var in VARS {
                std::env::remove_var(var);
            }
        }

        // Scenario 1: Missing API key should error
        clear_all();
        match HttpBrainConfig::from_env("HTTPBRAINTEST") {
            Err(BrainError::Configuration(msg)) => assert!(msg.contains("HTTPBRAINTEST_API_KEY")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }

        // Scenario 2: Only API key set, defaults used
        clear_all();
        std::env::set_var("HTTPBRAINTEST_API_KEY", "test-env-key");
        std::env::set_var("HTTPBRAINTEST_PROMPT_FILE", "/definitely/not/here.md");

        let config = HttpBrainConfig::from_env("HTTPBRAINTEST").unwrap();
        assert_eq!(config.name, "httpbraintest");
        assert_eq!(config.api_key, "test-env-key");
        assert_eq!(config.api_url, "https://api.x.ai");
        assert!(config.system_prompt.is_none());
        assert_eq!(config.max_tokens, Some(1024));

        // Scenario 3: All vars set
        clear_all();
        std::env::set_var("HTTPBRAINTEST_API_KEY", "full-test-key");
        std::env::set_var("HTTPBRAINTEST_API_URL", "https://test.api.com");
        std::env::set_var("HTTPBRAINTEST_MODEL", "model-x");
        std::env::set_var("HTTPBRAINTEST_SYSTEM_PROMPT", "Test prompt");
        std::env::set_var("HTTPBRAINTEST_MAX_TOKENS", "2048");
        std::env::set_var("HTTPBRAINTEST_TEMPERATURE", "0.9");
        std::env::set_var("HTTPBRAINTEST_TIMEOUT_MS", "1500");

        let config = HttpBrainConfig::from_env("HTTPBRAINTEST").unwrap();
        assert_eq!(config.api_url, "https://test.api.com");
        assert_eq!(config.model, "model-x");
        assert_eq!(config.system_prompt, Some("Test prompt".to_string()));
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(config.temperature, Some(0.9));
        assert_eq!(config.timeout, Duration::from_millis(1500));

        clear_all();
    }
}
