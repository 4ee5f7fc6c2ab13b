//! icoach-ai library interface
//!
//! Exposes the provider call orchestration core and the HTTP surface for
//! integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, CallError, ProviderError};

use axum::Router;
use chrono::{DateTime, Utc};
use icoach_common::config::TomlConfig;
use icoach_common::events::EventBus;
use services::{
    GenerativeModel, RateLimitedQueue, ResourceFinder, SessionEvaluator, SignalExtractor,
    Transcriber,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
///
/// Every component holds a handle to the same [`RateLimitedQueue`], so
/// the concurrency and spacing limits apply across all of them.
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<SessionEvaluator>,
    pub extractor: Arc<SignalExtractor>,
    pub transcriber: Arc<Transcriber>,
    pub resource_finder: Arc<ResourceFinder>,
    /// Shared queue for frequent/cheap calls
    pub queue: RateLimitedQueue,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire every component to `model` and one shared queue
    pub fn from_config(
        toml_config: &TomlConfig,
        model: Arc<dyn GenerativeModel>,
        event_bus: EventBus,
    ) -> Self {
        let queue = RateLimitedQueue::new(config::queue_config(toml_config));
        let retry = config::queued_retry_policy(toml_config, &event_bus);
        let models = &toml_config.models;

        let extractor = Arc::new(SignalExtractor::new(
            Arc::clone(&model),
            queue.clone(),
            models.extraction.clone(),
            retry.clone(),
        ));
        let transcriber = Arc::new(Transcriber::new(
            Arc::clone(&model),
            queue.clone(),
            models.transcription.clone(),
            retry.clone(),
        ));
        let resource_finder = Arc::new(ResourceFinder::new(
            Arc::clone(&model),
            queue.clone(),
            models.research.clone(),
            retry,
        ));
        let evaluator = Arc::new(SessionEvaluator::new(
            model,
            queue.clone(),
            Arc::clone(&extractor),
            config::evaluator_config(toml_config, &event_bus),
            event_bus.clone(),
        ));

        Self {
            evaluator,
            extractor,
            transcriber,
            resource_finder,
            queue,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::session_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
