//! Google Gemini `generateContent` client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::traits::{Backend, BackendError};
use crate::runner::rate_limiter::RateLimiter;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const GREETING: &str = "Hi, Gemini.";

/// Sampling settings sent with every request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
        }
    }
}

/// Gemini client that opens each conversation with a short greeting turn
/// before sending the task.
pub struct GeminiClient {
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    generation: GenerationConfig,
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "Gemini".to_string(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            generation: GenerationConfig::default(),
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::new(15, 1_000_000)),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_rate_limits(mut self, rpm: u32, tpm: u32) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(rpm, tpm));
        self
    }

    fn request_body<'a>(&'a self, task: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![
                Content {
                    role: "user",
                    parts: vec![Part { text: GREETING }],
                },
                Content {
                    role: "user",
                    parts: vec![Part { text: task }],
                },
            ],
            generation_config: &self.generation,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn extract_text(response: GenerateResponse) -> Result<String, BackendError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Parse("Empty 'candidates' array in response".to_string()))?;

    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default())
}

#[async_trait]
impl Backend for GeminiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, task: &str) -> Result<String, BackendError> {
        self.rate_limiter.acquire().await;

        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(task))
            .send()
            .await?;

        let status = response.status();
        if status == 429 {
            return Err(BackendError::RateLimited { retry_after_ms: 60_000 });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            if status == 401 || status == 403 {
                return Err(BackendError::Auth(message));
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: GenerateResponse = response.json().await?;
        if let Some(usage) = &api_response.usage_metadata {
            self.rate_limiter.record_tokens(usage.total_token_count).await;
        }
        extract_text(api_response)
    }
}
