//! OpenAI-compatible chat completions client (ChatGPT, Mistral)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::traits::{Backend, BackendError};
use crate::runner::rate_limiter::RateLimiter;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Client for any service speaking the `/chat/completions` dialect.
///
/// The task is sent as a single `user` message to a fixed model.
pub struct ChatCompletionsClient {
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
}

impl ChatCompletionsClient {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::new(500, 200_000)),
        }
    }

    /// ChatGPT on `gpt-4o-mini`
    pub fn chatgpt(api_key: impl Into<String>) -> Self {
        Self::new("ChatGPT", api_key, "gpt-4o-mini")
    }

    /// Mistral's hosted API is wire compatible with OpenAI's
    pub fn mistral(api_key: impl Into<String>) -> Self {
        Self::new("Mistral", api_key, "mistral-large-latest").with_base_url(MISTRAL_BASE_URL)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limits(mut self, rpm: u32, tpm: u32) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(rpm, tpm));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn error_message(body: &str, status: u16) -> (String, Option<String>) {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.error_type),
        Err(_) => (format!("HTTP {}: {}", status, body), None),
    }
}

#[async_trait]
impl Backend for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, task: &str) -> Result<String, BackendError> {
        self.rate_limiter.acquire().await;
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(task.to_string()),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            "{} answered HTTP {} in {}ms",
            self.name,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60)
                * 1000;

            // 429 is also used for an exhausted quota, which no retry will fix
            let body = response.text().await.unwrap_or_default();
            let (message, error_type) = error_message(&body, 429);
            if error_type.as_deref() == Some("insufficient_quota") {
                return Err(BackendError::Auth(format!("quota exceeded: {}", message)));
            }
            return Err(BackendError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, _) = error_message(&body, status.as_u16());
            if status == 401 || status == 403 {
                return Err(BackendError::Auth(message));
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ChatResponse = response.json().await?;
        if let Some(usage) = &api_response.usage {
            self.rate_limiter
                .record_tokens(usage.prompt_tokens + usage.completion_tokens)
                .await;
        }

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| BackendError::Parse("No choices in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let gpt = ChatCompletionsClient::chatgpt("key");
        assert_eq!(gpt.name(), "ChatGPT");
        assert_eq!(gpt.model(), "gpt-4o-mini");
        assert_eq!(gpt.base_url(), OPENAI_BASE_URL);

        let mistral = ChatCompletionsClient::mistral("key");
        assert_eq!(mistral.name(), "Mistral");
        assert_eq!(mistral.base_url(), MISTRAL_BASE_URL);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ChatCompletionsClient::new("Local", "k", "m").with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_error_message_parsing() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
        let (message, kind) = error_message(body, 429);
        assert_eq!(message, "You exceeded your current quota");
        assert_eq!(kind.as_deref(), Some("insufficient_quota"));

        let (message, kind) = error_message("gateway down", 502);
        assert_eq!(message, "HTTP 502: gateway down");
        assert!(kind.is_none());
    }

    #[test]
    fn test_request_omits_unset_options() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some("hi".to_string()),
            }],
            max_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
