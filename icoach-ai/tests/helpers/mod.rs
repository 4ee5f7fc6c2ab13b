//! Test helper utilities
//!
//! Shared utilities for testing icoach-ai: a scripted provider, canned
//! model output and log capture.

#![allow(dead_code)]

pub mod log_capture;

pub use log_capture::{capture_logs, LogCapture};

use async_trait::async_trait;
use icoach_ai::error::ProviderError;
use icoach_ai::services::{GenerateRequest, GenerativeModel, ModelResponse};
use icoach_common::config::TomlConfig;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Script key for structured-output (extraction) calls
pub const EXTRACTION: &str = "extraction";
pub const PRIMARY_MODEL: &str = "gemini-2.5-pro";
pub const FALLBACK_MODEL: &str = "gemini-2.5-flash";

/// Fake provider answering from per-key scripts
///
/// Calls carrying a response schema use the [`EXTRACTION`] key; every
/// other call is keyed by model name. One-shot replies are consumed in
/// order, then the sticky reply for the key (if any) is used. Unscripted
/// calls fail with a non-retryable 400.
#[derive(Default)]
pub struct ScriptedModel {
    once: Mutex<HashMap<String, VecDeque<Result<ModelResponse, ProviderError>>>>,
    sticky: Mutex<HashMap<String, Result<ModelResponse, ProviderError>>>,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for `key`
    pub fn then(self, key: &str, reply: Result<ModelResponse, ProviderError>) -> Self {
        self.once
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for `key` whenever no one-shot reply is queued
    pub fn always(self, key: &str, reply: Result<ModelResponse, ProviderError>) -> Self {
        self.sticky.lock().unwrap().insert(key.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<GenerateRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made with `key`
    pub fn call_count(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|request| key_for(request) == key)
            .count()
    }
}

fn key_for(request: &GenerateRequest) -> String {
    if request.config.response_schema.is_some() {
        EXTRACTION.to_string()
    } else {
        request.model.clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
        let key = key_for(&request);
        self.calls.lock().unwrap().push(request);

        if let Some(reply) = self
            .once
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }

        match self.sticky.lock().unwrap().get(&key) {
            Some(reply) => reply.clone(),
            None => Err(ProviderError::new(
                Some(400),
                format!("no scripted reply for {}", key),
            )),
        }
    }
}

pub fn text(body: impl Into<String>) -> Result<ModelResponse, ProviderError> {
    Ok(ModelResponse::from_text(body))
}

pub fn fail(status: u16, message: &str) -> Result<ModelResponse, ProviderError> {
    Err(ProviderError::new(Some(status), message))
}

/// Provider body for a missing model
pub const MODEL_NOT_FOUND: &str =
    "models/gemini-2.5-pro is not found for API version v1beta, or is not supported for generateContent";

/// Provider body for an exhausted free-tier daily quota
pub const QUOTA_ZERO: &str = r#"{"error":{"code":429,"message":"Quota exceeded for metric: generate_content_free_tier_requests, limit: 0","status":"RESOURCE_EXHAUSTED"}}"#;

/// Well-formed evaluation output with the given rubric scores
pub fn evaluation_json(scores: &[f64], communication: f64) -> String {
    let rubric: Vec<_> = scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            json!({
                "category": format!("Category {}", i + 1),
                "score": score,
                "justification": "grounded in the transcript"
            })
        })
        .collect();

    json!({
        "rubric": rubric,
        "communication": {
            "clarity": communication,
            "structure": communication,
            "confidence": communication,
            "conciseness": communication
        },
        "initial_annotations": [
            {"quote": "I would start with the goal", "kind": "strength", "comment": "Clear framing"}
        ],
        "defense_annotations": [],
        "golden_path": [],
        "summary": "Solid structure, thin metrics.",
        "defense_feedback": "Held the line under pressure.",
        "improvement_tips": ["Quantify the north-star metric"]
    })
    .to_string()
}

/// Minimal extraction output
pub fn extraction_json() -> String {
    json!({
        "frameworks": [{"quote": "I would start with the goal", "category": "goal_first"}],
        "metrics": [{"quote": "weekly active riders", "category": "north_star", "qualifier": true}]
    })
    .to_string()
}

/// Config whose retries resolve quickly under paused time
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::with_defaults();
    config.retry.base_delay_ms = 10;
    config.primary_retry.base_delay_ms = 10;
    config.queue.min_spacing_ms = 50;
    config
}
