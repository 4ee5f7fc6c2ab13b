//! Configuration resolution for icoach-ai
//!
//! Resolves the provider API key from ENV → TOML, and turns the TOML tables
//! into the retry/queue/evaluator settings the services take.

use crate::services::{EvaluatorConfig, QueueConfig, RetryPolicy};
use icoach_common::config::TomlConfig;
use icoach_common::events::EventBus;
use icoach_common::{Error, Result};
use tracing::{info, warn};

/// Environment variables checked for the API key, highest priority first
pub const API_KEY_ENV_VARS: [&str; 2] = ["ICOACH_GEMINI_API_KEY", "GEMINI_API_KEY"];

/// Resolve the Gemini API key
///
/// **Priority:** `ICOACH_GEMINI_API_KEY` → `GEMINI_API_KEY` → TOML
/// `gemini_api_key`. Whitespace-only values are ignored.
pub fn resolve_gemini_api_key(toml_config: &TomlConfig) -> Result<String> {
    let mut candidates: Vec<(&str, String)> = API_KEY_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok().map(|key| (*var, key)))
        .filter(|(_, key)| is_valid_key(key))
        .collect();

    if let Some(key) = toml_config.gemini_api_key.as_ref().filter(|k| is_valid_key(k)) {
        candidates.push(("TOML config", key.clone()));
    }

    if candidates.len() > 1 {
        let sources: Vec<&str> = candidates.iter().map(|(source, _)| *source).collect();
        warn!(
            "Gemini API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match candidates.into_iter().next() {
        Some((source, key)) => {
            info!("Gemini API key loaded from {}", source);
            Ok(key.trim().to_string())
        }
        None => Err(Error::Config(
            "Gemini API key not configured. Please configure using one of:\n\
             1. Environment: ICOACH_GEMINI_API_KEY=your-key-here (or GEMINI_API_KEY)\n\
             2. TOML config: ~/.config/icoach/icoach-ai.toml (gemini_api_key = \"your-key\")\n\
             \n\
             Obtain an API key at: https://aistudio.google.com/apikey"
                .to_string(),
        )),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Retry policy for calls routed through the shared queue
pub fn queued_retry_policy(toml_config: &TomlConfig, events: &EventBus) -> RetryPolicy {
    RetryPolicy::from_settings(&toml_config.retry, "provider call").with_events(events.clone())
}

pub fn queue_config(toml_config: &TomlConfig) -> QueueConfig {
    QueueConfig::from(&toml_config.queue)
}

pub fn evaluator_config(toml_config: &TomlConfig, events: &EventBus) -> EvaluatorConfig {
    let models = &toml_config.models;
    EvaluatorConfig {
        primary_model: models.evaluation_primary.clone(),
        fallback_model: models.evaluation_fallback.clone(),
        primary_retry: RetryPolicy::from_settings(&toml_config.primary_retry, "evaluation primary")
            .with_events(events.clone()),
        fallback_retry: queued_retry_policy(toml_config, events).labeled("evaluation fallback"),
        thinking_budget: models.primary_thinking_budget,
    }
}
