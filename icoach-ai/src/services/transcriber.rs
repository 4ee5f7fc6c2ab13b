//! Audio transcription through the shared queue

use super::backoff_retrier::RetryPolicy;
use super::provider::{GenerateRequest, GenerativeModel, Part};
use super::rate_limited_queue::RateLimitedQueue;
use crate::error::CallError;
use std::sync::Arc;
use tracing::debug;

const TRANSCRIBE_INSTRUCTION: &str = "Transcribe this interview answer verbatim. Keep filler \
words, false starts and hedges exactly as spoken. Return only the transcript text with no \
commentary, labels or formatting.";

pub struct Transcriber {
    model: Arc<dyn GenerativeModel>,
    queue: RateLimitedQueue,
    model_name: String,
    retry: RetryPolicy,
}

impl Transcriber {
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

    /// Transcribe recorded audio (`mime_type` e.g. `audio/webm`)
    pub async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, CallError> {
        if audio.is_empty() {
            return Err(CallError::InvalidRequest("audio payload is empty".to_string()));
        }
        if mime_type.trim().is_empty() {
            return Err(CallError::InvalidRequest("audio MIME type is missing".to_string()));
        }

        debug!(bytes = audio.len(), mime_type, "Transcribing audio");

        let request = GenerateRequest::text(&self.model_name, TRANSCRIBE_INSTRUCTION).with_part(
            Part::InlineData {
                mime_type: mime_type.to_string(),
                data: audio,
            },
        );

        let response = self
            .queue
            .call(Arc::clone(&self.model), request, self.retry.labeled("transcription"))
            .await?;

        let transcript = response.text.trim();
        if transcript.is_empty() {
            return Err(CallError::EmptyResponse(format!(
                "{} returned no transcript",
                self.model_name
            )));
        }

        Ok(transcript.to_string())
    }
}
