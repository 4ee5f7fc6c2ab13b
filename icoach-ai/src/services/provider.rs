//! Generative model provider seam
//!
//! The orchestration core only talks to the provider through
//! [`GenerativeModel`], so tests can substitute scripted fakes and the
//! concrete HTTP client ([`super::gemini_client::GeminiClient`]) stays an
//! implementation detail.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;

/// One part of a prompt payload
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Binary payload sent inline (e.g. recorded audio)
    InlineData { mime_type: String, data: Vec<u8> },
}

/// Optional generation hints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    /// e.g. `application/json`
    pub response_mime_type: Option<String>,
    /// JSON schema for constrained output
    pub response_schema: Option<Value>,
    /// Thinking effort hint in tokens
    pub thinking_budget: Option<i32>,
    /// Enable the web search tool (search-augmented call)
    pub google_search: bool,
}

impl GenerationConfig {
    /// JSON output constrained by `schema`
    pub fn structured(schema: Value) -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
            ..Default::default()
        }
    }

    /// JSON output without a schema
    pub fn json() -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        }
    }

    pub fn with_thinking_budget(mut self, budget: i32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }
}

/// One provider call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<Part>,
    pub config: GenerationConfig,
}

impl GenerateRequest {
    /// Text-only request
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            parts: vec![Part::Text(prompt.into())],
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }
}

/// Provider response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Concatenated text output (possibly empty)
    pub text: String,
    /// URLs the provider reports as actually used by a search-augmented call
    pub grounding_urls: Vec<String>,
}

impl ModelResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding_urls: Vec::new(),
        }
    }
}

/// Generative model provider
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &'static str;

    /// Issue one call; no retrying happens at this layer
    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError>;
}
