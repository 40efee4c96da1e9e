//! HttpBrain implementation over the chat completions protocol.

use std::time::Duration;

use brain_core::{async_trait, hash_prompt, Brain, BrainError, BrainParams};
use reqwest::{header, Client, StatusCode};
use tracing::{debug, info, warn};

use crate::api_types::{ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::config::HttpBrainConfig;

/// An AI provider reached over HTTP.
///
/// Each call is a single stateless completion: conversation context is
/// already folded into the prompt by the caller.
pub struct HttpBrain {
    client: Client,
    config: HttpBrainConfig,
    system_prompt_hash: Option<String>,
}

impl HttpBrain {
    /// Create a new HttpBrain with the given configuration.
    pub fn new(config: HttpBrainConfig) -> Result<Self, BrainError> {
        if config.api_key.is_empty() {
            return Err(BrainError::Configuration(format!(
                "provider '{}' has no API key",
                config.name
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BrainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let system_prompt_hash = config.system_prompt.as_deref().map(hash_prompt);
        if let Some(ref hash) = system_prompt_hash {
            info!("{} system prompt fingerprint: {}", config.name, hash);
        }

        info!("HttpBrain '{}' initialized with model: {}", config.name, config.model);

        Ok(Self {
            client,
            config,
            system_prompt_hash,
        })
    }

    /// Create an HttpBrain from environment variables under `prefix`.
    ///
    /// See [`HttpBrainConfig::from_env`] for the variables read.
    pub fn from_env(prefix: &str) -> Result<Self, BrainError> {
        Self::new(HttpBrainConfig::from_env(prefix)?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &HttpBrainConfig {
        &self.config
    }

    /// Get the system prompt fingerprint, if configured.
    pub fn system_prompt_hash(&self) -> Option<&str> {
        self.system_prompt_hash.as_deref()
    }

    fn build_request(&self, prompt: &str, params: &BrainParams) -> ChatCompletionRequest {
        let mut messages = Vec::new();

        let system = params
            .get("system")
            .and_then(|v| v.as_str())
            .or(self.config.system_prompt.as_deref());
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        ChatCompletionRequest {
            model: params
                .get("model")
                .and_then(|v| v.as_str())
                .unwrap_or(&self.config.model)
                .to_string(),
            messages,
            max_tokens: params
                .get("max_tokens")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .or(self.config.max_tokens),
            temperature: params
                .get("temperature")
                .and_then(|v| v.as_f64())
                .map(|v| v as f32)
                .or(self.config.temperature),
        }
    }
}

/// Parse a `Retry-After` header given in seconds.
fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Map a non-success HTTP status to a provider error.
fn map_status(status: StatusCode, retry_after: Option<&str>, body: &str) -> BrainError {
    let detail = serde_json::from_str::<ApiError>(body)
        .map(|e| match e.error.error_type {
            Some(kind) => format!("{} [{}]", e.error.message, kind),
            None => e.error.message,
        })
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status.as_u16() {
        429 => BrainError::RateLimited {
            retry_after: parse_retry_after(retry_after),
        },
        401 | 403 => BrainError::Configuration(format!("authentication rejected ({})", status.as_u16())),
        408 | 504 => BrainError::Timeout,
        s if s >= 500 => BrainError::Unavailable(format!("API error ({}): {}", s, detail)),
        s => BrainError::Configuration(format!("API error ({}): {}", s, detail)),
    }
}

/// Map a transport failure to a provider error.
fn map_transport(err: reqwest::Error) -> BrainError {
    if err.is_timeout() {
        BrainError::Timeout
    } else if err.is_connect() {
        BrainError::Unavailable(format!("connection failed: {}", err))
    } else {
        BrainError::Network(format!("Failed to send request: {}", err))
    }
}

/// Pull the completion text out of a response body.
fn extract_text(body: &str) -> Result<String, BrainError> {
    let completion: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| BrainError::Malformed(format!("Failed to parse response: {}", e)))?;

    if let Some(usage) = &completion.usage {
        debug!(
            "Token usage - prompt: {}, completion: {}, total: {}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }

    let choice = completion.choices.into_iter().next();
    if let Some(reason) = choice.as_ref().and_then(|c| c.finish_reason.as_deref()) {
        debug!("Completion from {:?} finished: {}", completion.model, reason);
    }

    choice
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| BrainError::Malformed("empty completion".to_string()))
}

#[async_trait]
impl Brain for HttpBrain {
    async fn generate(&self, prompt: &str, params: &BrainParams) -> Result<String, BrainError> {
        let url = format!("{}/v1/chat/completions", self.config.api_url.trim_end_matches('/'));
        let request = self.build_request(prompt, params);

        debug!("Sending request to {} ({})", self.config.name, request.model);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(map_transport)?;

        if !status.is_success() {
            let err = map_status(status, retry_after.as_deref(), &body);
            warn!(provider = %self.config.name, status = status.as_u16(), error = %err, "PROVIDER_HTTP_ERROR");
            return Err(err);
        }

        extract_text(&body)
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn is_ready(&self) -> bool {
        !self.config.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brain() -> HttpBrain {
        let config = HttpBrainConfig::builder()
            .name("test")
            .api_key("test-key")
            .model("base-model")
            .system_prompt("Be brief.")
            .build();
        HttpBrain::new(config).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let result = HttpBrain::new(HttpBrainConfig::default());
        assert!(matches!(result, Err(BrainError::Configuration(_))));
    }

    #[test]
    fn test_brain_name() {
        let brain = brain();
        assert_eq!(brain.name(), "test");
        assert_eq!(brain.system_prompt_hash(), Some(hash_prompt("Be brief.").as_str()));
    }

    #[test]
    fn test_build_request_applies_params() {
        let brain = brain();
        let mut params = BrainParams::new();
        params.insert("model".to_string(), json!("override"));
        params.insert("temperature".to_string(), json!(0.2));

        let request = brain.build_request("hello", &params);
        assert_eq!(request.model, "override");
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(1024));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].content, "hello");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, Some("12"), ""),
            BrainError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(12)
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, Some("soon"), ""),
            BrainError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            map_status(
                StatusCode::BAD_GATEWAY,
                None,
                r#"{"error": {"message": "upstream down", "type": "server"}}"#
            ),
            BrainError::Unavailable(msg) if msg.contains("upstream down")
        ));
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, None, ""),
            BrainError::Configuration(_)
        ));
        assert!(matches!(
            map_status(StatusCode::GATEWAY_TIMEOUT, None, ""),
            BrainError::Timeout
        ));
    }

    #[test]
    fn test_extract_text() {
        let body = json!({
            "choices": [{"message": {"content": "  Hi there  "}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        })
        .to_string();
        assert_eq!(extract_text(&body).unwrap(), "Hi there");

        let empty = json!({"choices": [{"message": {"content": null}}]}).to_string();
        assert!(matches!(extract_text(&empty), Err(BrainError::Malformed(_))));

        assert!(matches!(extract_text("<html>"), Err(BrainError::Malformed(_))));
    }
}
