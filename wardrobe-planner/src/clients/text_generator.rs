//! Text generation clients used for outfit rationale

use super::{build_http_client, check_status, ClientError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_GEMINI_MODEL: &str = "models/text-bison-001";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta2";

/// Keys with this prefix are OAuth access tokens, sent as a bearer header
const OAUTH_TOKEN_PREFIX: &str = "ya29.";

/// Produces free text for a prompt
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generator identifier used in logs
    fn name(&self) -> &'static str;

    /// Generate text for `prompt`
    ///
    /// # Returns
    /// * `Ok(text)` - Non-empty generated text
    /// * `Err(_)` - Generation failed; callers degrade to no text
    async fn generate_text(&self, prompt: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    prompt: &'a str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    text: Option<String>,
}

/// Client for a text-generation proxy that keeps provider keys server-side
pub struct LlmProxyClient {
    http_client: reqwest::Client,
    url: String,
    temperature: f32,
}

impl LlmProxyClient {
    pub fn new(url: impl Into<String>, temperature: f32) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client()?,
            url: url.into(),
            temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for LlmProxyClient {
    fn name(&self) -> &'static str {
        "llm-proxy"
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ClientError> {
        debug!(url = %self.url, "Calling LLM proxy");

        let response = self
            .http_client
            .post(&self.url)
            .json(&ProxyRequest {
                prompt,
                temperature: self.temperature,
            })
            .send()
            .await?;
        let body: ProxyResponse = check_status(response).await?.json().await?;

        body.text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ClientError::Parse("proxy response has no text".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct GeminiPrompt<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    prompt: GeminiPrompt<'a>,
    temperature: f32,
}

/// Direct client for the generative-language `generateText` endpoint
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
        temperature: f32,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client()?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            api_key: api_key.into(),
            temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateText",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Pull the answer out of a response body
    ///
    /// Prefers `candidates[0].content`, then `candidates[0].output`, then a
    /// top-level `output` string.
    fn extract_text(body: &serde_json::Value) -> Option<String> {
        if let Some(first) = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        {
            return first
                .get("content")
                .and_then(|v| v.as_str())
                .or_else(|| first.get("output").and_then(|v| v.as_str()))
                .map(str::to_string)
                .or_else(|| Some(first.to_string()));
        }
        body.get("output")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ClientError> {
        let request = GeminiRequest {
            prompt: GeminiPrompt { text: prompt },
            temperature: self.temperature,
        };

        let builder = self.http_client.post(self.endpoint()).json(&request);
        let builder = if self.api_key.starts_with(OAUTH_TOKEN_PREFIX) {
            builder.bearer_auth(&self.api_key)
        } else {
            builder.query(&[("key", self.api_key.as_str())])
        };

        debug!(model = %self.model, "Calling Gemini generateText");
        let response = builder.send().await?;
        let body: serde_json::Value = check_status(response).await?.json().await?;

        Self::extract_text(&body)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ClientError::Parse("no candidates in response".to_string()))
    }
}

/// Tries each generator in order; the first non-empty answer wins
pub struct FallbackTextGenerator {
    generators: Vec<Arc<dyn TextGenerator>>,
}

impl FallbackTextGenerator {
    pub fn new(generators: Vec<Arc<dyn TextGenerator>>) -> Self {
        Self { generators }
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

#[async_trait]
impl TextGenerator for FallbackTextGenerator {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ClientError> {
        let mut last_error = ClientError::NotConfigured("no text generator".to_string());
        for generator in &self.generators {
            match generator.generate_text(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("Text generator '{}' failed: {}", generator.name(), e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
