//! Provider call orchestration
//!
//! Leaf to root: error classification, bounded retry, the shared
//! rate-limited queue, JSON recovery, then the components that issue calls
//! (signal extraction, session evaluation, transcription, resource search).

pub mod backoff_retrier;
pub mod error_classifier;
pub mod gemini_client;
pub mod prompts;
pub mod provider;
pub mod rate_limited_queue;
pub mod resource_finder;
pub mod response_extractor;
pub mod session_evaluator;
pub mod signal_extractor;
pub mod transcriber;

pub use backoff_retrier::{with_backoff, RetryPolicy};
pub use error_classifier::{classify, ErrorClassification, ErrorKind};
pub use gemini_client::GeminiClient;
pub use prompts::{EvaluationPromptBuilder, ExtractionPrompt, Prompt, PromptError};
pub use provider::{GenerateRequest, GenerationConfig, GenerativeModel, ModelResponse, Part};
pub use rate_limited_queue::{QueueConfig, QueueStats, RateLimitedQueue};
pub use resource_finder::{LearningResource, ResourceFinder};
pub use response_extractor::extract_json;
pub use session_evaluator::{derive_scores, DerivedScores, EvaluatorConfig, SessionEvaluator};
pub use signal_extractor::SignalExtractor;
pub use transcriber::Transcriber;
