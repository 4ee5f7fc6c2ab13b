//! Gemini API client
//!
//! Implements [`GenerativeModel`] over the `generateContent` REST endpoint.
//!
//! Failures keep the provider's own wording: non-2xx responses become
//! `ProviderError { status, message: <response body> }` so the error
//! classifier can see `RESOURCE_EXHAUSTED`, `retryDelay` and friends.

use super::provider::{GenerateRequest, GenerativeModel, ModelResponse, Part};
use crate::error::ProviderError;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single generateContent call
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini API client
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Create a client for `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`)
    ///
    /// `timeout` bounds every call so a stalled request cannot hold a queue
    /// slot forever.
    pub fn new(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    /// Build the JSON request body for `request`
    pub fn build_body(request: &GenerateRequest) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => json!({ "text": text }),
                Part::InlineData { mime_type, data } => json!({
                    "inlineData": {
                        "mimeType": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(data),
                    }
                }),
            })
            .collect();

        let mut body = Map::new();
        body.insert(
            "contents".to_string(),
            json!([{ "role": "user", "parts": parts }]),
        );

        let config = &request.config;
        let mut generation_config = Map::new();
        if let Some(mime) = &config.response_mime_type {
            generation_config.insert("responseMimeType".to_string(), json!(mime));
        }
        if let Some(schema) = &config.response_schema {
            generation_config.insert("responseSchema".to_string(), schema.clone());
        }
        if let Some(budget) = config.thinking_budget {
            generation_config.insert(
                "thinkingConfig".to_string(),
                json!({ "thinkingBudget": budget }),
            );
        }
        if !generation_config.is_empty() {
            body.insert(
                "generationConfig".to_string(),
                Value::Object(generation_config),
            );
        }

        if config.google_search {
            body.insert("tools".to_string(), json!([{ "googleSearch": {} }]));
        }

        Value::Object(body)
    }

    /// Extract text and grounding URLs from a generateContent response
    pub fn parse_response(body: &Value) -> ModelResponse {
        let candidate = body.get("candidates").and_then(|c| c.get(0));

        let text = candidate
            .and_then(|c| c.pointer("/content/parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    // Thought summaries are not part of the answer
                    .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default();

        let grounding_urls = candidate
            .and_then(|c| c.pointer("/groundingMetadata/groundingChunks"))
            .and_then(Value::as_array)
            .map(|chunks| {
                chunks
                    .iter()
                    .filter_map(|chunk| chunk.pointer("/web/uri").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        ModelResponse {
            text,
            grounding_urls,
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
        let url = self.endpoint(&request.model);
        let body = Self::build_body(&request);

        debug!(model = %request.model, parts = request.parts.len(), "Calling Gemini API");

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::transport(format!("request timeout: {}", e))
                } else {
                    ProviderError::transport(format!("network error: {}", e))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(Some(status.as_u16()), error_text));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("invalid response body: {}", e)))?;

        Ok(Self::parse_response(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::GenerationConfig;

    #[test]
    fn test_client_creation() {
        let client = GeminiClient::new("key".to_string(), "https://example.test/v1beta/", None);
        assert!(client.is_ok());
        assert_eq!(
            client.unwrap().endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_body_includes_inline_audio_and_config() {
        let request = GenerateRequest::text("m", "Transcribe this")
            .with_part(Part::InlineData {
                mime_type: "audio/webm".to_string(),
                data: b"abc".to_vec(),
            })
            .with_config(GenerationConfig::json().with_thinking_budget(1024));

        let body = GeminiClient::build_body(&request);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Transcribe this");
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["data"],
            "YWJj"
        );
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            1024
        );
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_plain_request_has_no_generation_config() {
        let body = GeminiClient::build_body(&GenerateRequest::text("m", "hi"));
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_search_tool_enabled() {
        let mut config = GenerationConfig::default();
        config.google_search = true;
        let body = GeminiClient::build_body(&GenerateRequest::text("m", "hi").with_config(config));
        assert!(body["tools"][0].get("googleSearch").is_some());
    }

    #[test]
    fn test_parse_response_joins_text_and_skips_thoughts() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "{\"a\":"},
                    {"text": "1}"}
                ]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://a.example/x", "title": "A"}},
                    {"retrievedContext": {}}
                ]}
            }]
        });

        let parsed = GeminiClient::parse_response(&body);

        assert_eq!(parsed.text, "{\"a\":1}");
        assert_eq!(parsed.grounding_urls, vec!["https://a.example/x".to_string()]);
    }

    #[test]
    fn test_parse_response_without_candidates_is_empty() {
        let parsed = GeminiClient::parse_response(&json!({"promptFeedback": {}}));
        assert!(parsed.text.is_empty());
        assert!(parsed.grounding_urls.is_empty());
    }
}
