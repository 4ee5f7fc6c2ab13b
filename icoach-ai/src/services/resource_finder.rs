//! Search-grounded study resource recommendations
//!
//! The model may invent URLs. Only links the provider reports in the
//! response's grounding metadata are returned.

use super::backoff_retrier::RetryPolicy;
use super::provider::{GenerateRequest, GenerationConfig, GenerativeModel};
use super::rate_limited_queue::RateLimitedQueue;
use super::response_extractor::extract_json;
use crate::error::CallError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on resources requested from the model
const MAX_RESOURCES: usize = 5;

/// One recommended study resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningResource {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub reason: String,
}

pub struct ResourceFinder {
    model: Arc<dyn GenerativeModel>,
    queue: RateLimitedQueue,
    model_name: String,
    retry: RetryPolicy,
}

impl ResourceFinder {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        queue: RateLimitedQueue,
        model_name: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            model,
            queue,
            model_name: model_name.into(),
            retry,
        }
    }

    /// Find resources for `question`, weighted toward `focus_areas`
    ///
    /// Provider failures propagate. Unusable output yields an empty list.
    pub async fn find(
        &self,
        question: &str,
        focus_areas: &[String],
    ) -> Result<Vec<LearningResource>, CallError> {
        if question.trim().is_empty() {
            return Err(CallError::InvalidRequest("question is empty".to_string()));
        }

        let config = GenerationConfig {
            google_search: true,
            ..Default::default()
        };
        let request = GenerateRequest::text(&self.model_name, research_prompt(question, focus_areas))
            .with_config(config);

        let response = self
            .queue
            .call(Arc::clone(&self.model), request, self.retry.labeled("resource search"))
            .await?;

        let Some(candidates) = parse_resources(&response.text) else {
            warn!(model = %self.model_name, "Resource search output unusable, returning no resources");
            return Ok(Vec::new());
        };

        Ok(keep_grounded(candidates, &response.grounding_urls))
    }
}

fn research_prompt(question: &str, focus_areas: &[String]) -> String {
    let focus = if focus_areas.is_empty() {
        "general preparation".to_string()
    } else {
        focus_areas.join(", ")
    };
    format!(
        "Search the web for up to {} high-quality articles, guides or videos that would help a \
product manager candidate improve on this interview question.\n\
Question: {}\nAreas to improve: {}\n\
Only recommend pages you actually found in search results. Respond with a JSON array of \
{{\"title\": string, \"url\": string, \"reason\": string}}.",
        MAX_RESOURCES,
        question.trim(),
        focus
    )
}

/// Candidate resources from model text
///
/// Accepts a bare array or an object holding a `resources` array;
/// malformed items are skipped.
pub fn parse_resources(text: &str) -> Option<Vec<LearningResource>> {
    let items = match extract_json(text)? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("resources") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
    )
}

/// Canonical form used to compare URLs: scheme and host lowercased,
/// trailing slash dropped
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    Some(parsed.as_str().trim_end_matches('/').to_string())
}

/// Drop candidates whose URL is not in the grounding set
pub fn keep_grounded(
    candidates: Vec<LearningResource>,
    grounding_urls: &[String],
) -> Vec<LearningResource> {
    let grounded: HashSet<String> = grounding_urls
        .iter()
        .filter_map(|u| normalize_url(u))
        .collect();

    candidates
        .into_iter()
        .filter(|resource| {
            let keep = normalize_url(&resource.url)
                .map(|u| grounded.contains(&u))
                .unwrap_or(false);
            if !keep {
                debug!(url = %resource.url, "Dropping ungrounded resource URL");
            }
            keep
        })
        .take(MAX_RESOURCES)
        .collect()
}
