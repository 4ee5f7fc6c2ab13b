//! Signal extraction pass
//!
//! Distills one transcript into categorized verbatim evidence before the
//! session evaluation call. This is optional enrichment: every failure
//! degrades to `None` and never aborts the caller.

use super::backoff_retrier::RetryPolicy;
use super::prompts::ExtractionPrompt;
use super::provider::{GenerateRequest, GenerationConfig, GenerativeModel};
use super::rate_limited_queue::RateLimitedQueue;
use super::response_extractor::extract_json;
use crate::error::CallError;
use crate::models::ExtractionResult;
use std::sync::Arc;
use tracing::{debug, warn};

/// Issues extraction calls through the shared queue
pub struct SignalExtractor {
    model: Arc<dyn GenerativeModel>,
    queue: RateLimitedQueue,
    model_name: String,
    retry: RetryPolicy,
}

impl SignalExtractor {
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

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Extract evidence from `transcript`; `label` names it in the prompt
    /// and in diagnostics (e.g. "initial answer")
    ///
    /// Returns `None` for an empty transcript or on any failure.
    pub async fn extract(&self, transcript: &str, label: &str) -> Option<ExtractionResult> {
        if transcript.trim().is_empty() {
            debug!(label, "Skipping extraction of empty transcript");
            return None;
        }

        match self.try_extract(transcript, label).await {
            Ok(result) => {
                debug!(label, items = result.total_items(), "Signal extraction complete");
                Some(result)
            }
            Err(err) => {
                warn!(
                    label,
                    model = %self.model_name,
                    error = %err,
                    "Signal extraction failed, continuing without evidence"
                );
                None
            }
        }
    }

    async fn try_extract(&self, transcript: &str, label: &str) -> Result<ExtractionResult, CallError> {
        let prompt = ExtractionPrompt::new(label, transcript).build()?;
        let request = GenerateRequest::text(&self.model_name, prompt.render())
            .with_config(GenerationConfig::structured(ExtractionPrompt::response_schema()));

        let response = self
            .queue
            .call(
                Arc::clone(&self.model),
                request,
                self.retry.labeled(format!("extraction ({})", label)),
            )
            .await?;

        let value = extract_json(&response.text).ok_or_else(|| {
            CallError::CriticalJson(format!("extraction output for {} was not JSON", label))
        })?;

        serde_json::from_value(value).map_err(|e| {
            CallError::CriticalJson(format!(
                "extraction output for {} had an unexpected shape: {}",
                label, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::services::provider::ModelResponse;
    use crate::services::rate_limited_queue::QueueConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedModel {
        reply: Result<String, ProviderError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeModel for FixedModel {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.config.response_schema.is_some());
            self.reply.clone().map(ModelResponse::from_text)
        }
    }

    fn extractor(reply: Result<String, ProviderError>) -> (SignalExtractor, Arc<FixedModel>) {
        let model = Arc::new(FixedModel {
            reply,
            calls: AtomicUsize::new(0),
        });
        let queue = RateLimitedQueue::new(QueueConfig {
            max_concurrent: 2,
            min_spacing: Duration::ZERO,
        });
        let retry = RetryPolicy::new("extraction")
            .with_max_retries(1)
            .with_base_delay(Duration::from_millis(10));
        (
            SignalExtractor::new(model.clone(), queue, "gemini-2.5-flash", retry),
            model,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_extracts_structured_output() {
        let reply = r#"{"metrics": [{"quote": "grow retention 5%", "category": "goal", "qualifier": true}]}"#;
        let (extractor, _) = extractor(Ok(reply.to_string()));

        let result = extractor.extract("we want to grow retention 5%", "initial answer").await;

        let result = result.unwrap();
        assert_eq!(result.metrics.len(), 1);
        assert_eq!(result.metrics[0].quote, "grow retention 5%");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fenced_output_still_parsed() {
        let reply = "Sure:\n```json\n{\"hedging\": [{\"quote\": \"maybe\", \"category\": \"hedge\"}],}\n```";
        let (extractor, _) = extractor(Ok(reply.to_string()));

        let result = extractor.extract("maybe", "defense").await.unwrap();
        assert_eq!(result.hedging[0].quote, "maybe");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_transcript_skips_call() {
        let (extractor, model) = extractor(Ok("{}".to_string()));
        assert!(extractor.extract("  \n", "defense").await.is_none());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_degrades_to_none() {
        let (extractor, model) = extractor(Err(ProviderError::new(Some(503), "UNAVAILABLE")));
        assert!(extractor.extract("some answer", "initial answer").await.is_none());
        // One retry allowed
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_output_degrades_to_none() {
        let (extractor, _) = extractor(Ok("I cannot help with that.".to_string()));
        assert!(extractor.extract("some answer", "initial answer").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_shape_degrades_to_none() {
        let (extractor, _) = extractor(Ok(r#"{"metrics": "none"}"#.to_string()));
        assert!(extractor.extract("some answer", "initial answer").await.is_none());
    }
}
