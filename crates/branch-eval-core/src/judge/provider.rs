//! LLM completion providers.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::domain::{EvalError, Result};

/// Text returned in place of a completion the provider refused on safety
/// grounds.
pub const SAFETY_BLOCKED: &str = "[BLOCKED_BY_SAFETY]";

/// Environment variables checked for the API key, first present wins.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Look up the provider API key.
pub fn api_key_from_env() -> Result<String> {
    API_KEY_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| EvalError::MissingApiKey {
            names: API_KEY_VARS.iter().map(|s| s.to_string()).collect(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

impl Completion {
    pub fn is_blocked(&self) -> bool {
        self.text.contains(SAFETY_BLOCKED)
    }
}

/// Provider seam for LLM completions.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Header carrying the key, so it never appears in a request URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini `generateContent` over HTTPS.
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            http,
        })
    }

    /// Provider keyed from [`API_KEY_VARS`].
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env()?)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            }
        })
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: UsageMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UsageMetadata {
    prompt_token_count: u64,
    candidates_token_count: u64,
}

impl GenerateResponse {
    fn into_completion(self) -> Completion {
        let usage = Usage {
            input_tokens: self.usage_metadata.prompt_token_count,
            output_tokens: self.usage_metadata.candidates_token_count,
        };

        let prompt_blocked = self
            .prompt_feedback
            .as_ref()
            .is_some_and(|f| f.block_reason.is_some());
        let first = self.candidates.into_iter().next();
        let candidate_blocked = first
            .as_ref()
            .and_then(|c| c.finish_reason.as_deref())
            .is_some_and(|r| r == "SAFETY");

        let text = if prompt_blocked || candidate_blocked {
            SAFETY_BLOCKED.to_string()
        } else {
            first
                .and_then(|c| c.content)
                .map(|c| {
                    c.parts
                        .into_iter()
                        .filter_map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default()
        };
        Completion { text, usage }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        debug!(model = %request.model, prompt_chars = request.prompt.len(), "gemini request");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&Self::request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(EvalError::Provider(format!("HTTP {status}: {snippet}")));
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.into_completion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transport_errors_do_not_carry_the_key() {
        let provider = GeminiProvider::new("SECRET-KEY-123")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let request = CompletionRequest {
            model: "gemini-2.0-flash".to_string(),
            prompt: "hi".to_string(),
            temperature: 0.0,
            max_output_tokens: 8,
        };
        let err = provider.complete(&request).await.unwrap_err();
        assert!(matches!(err, EvalError::Provider(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
    }

    fn parse(raw: serde_json::Value) -> Completion {
        serde_json::from_value::<GenerateResponse>(raw)
            .unwrap()
            .into_completion()
    }

    #[test]
    fn joins_parts_and_reads_usage() {
        let c = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"overall_score\":" }, { "text": " 4}" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 8 }
        }));
        assert_eq!(c.text, "{\"overall_score\": 4}");
        assert_eq!(c.usage, Usage { input_tokens: 120, output_tokens: 8 });
        assert!(!c.is_blocked());
    }

    #[test]
    fn safety_finish_maps_to_sentinel() {
        let c = parse(json!({
            "candidates": [{ "finishReason": "SAFETY" }],
            "usageMetadata": { "promptTokenCount": 10 }
        }));
        assert_eq!(c.text, SAFETY_BLOCKED);
        assert!(c.is_blocked());
        assert_eq!(c.usage.input_tokens, 10);
    }

    #[test]
    fn prompt_block_maps_to_sentinel() {
        let c = parse(json!({ "promptFeedback": { "blockReason": "OTHER" } }));
        assert!(c.is_blocked());
    }

    #[test]
    fn request_body_carries_generation_config() {
        let body = GeminiProvider::request_body(&CompletionRequest {
            model: "gemini-2.0-flash".into(),
            prompt: "hi".into(),
            temperature: 0.0,
            max_output_tokens: 256,
        });
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn debug_hides_api_key() {
        let provider = GeminiProvider::new("secret-key").unwrap();
        assert!(!format!("{provider:?}").contains("secret-key"));
    }
}
