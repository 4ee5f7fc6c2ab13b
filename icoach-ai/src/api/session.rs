//! Session API handlers
//!
//! POST /evaluate, POST /extract, POST /transcribe, POST /resources

use axum::{extract::State, routing::post, Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::{ExtractionResult, SessionRequest, SessionResult};
use crate::services::LearningResource;
use crate::AppState;

/// POST /extract request
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub transcript: String,
    /// Names the transcript in the prompt (e.g. "initial answer")
    #[serde(default)]
    pub label: Option<String>,
}

/// POST /transcribe request
#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    /// Base64 audio, optionally as a `data:<mime>;base64,` URL
    pub audio_base64: String,
    pub mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub transcript: String,
}

/// POST /resources request
#[derive(Debug, Deserialize)]
pub struct ResourcesRequest {
    pub question: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourcesResponse {
    pub resources: Vec<LearningResource>,
}

/// POST /evaluate
pub async fn evaluate_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> ApiResult<Json<SessionResult>> {
    info!(interview_type = ?request.interview_type, "Evaluation requested");
    let result = state.evaluator.evaluate(&request).await?;
    Ok(Json(result))
}

/// POST /extract
///
/// Responds `null` when extraction is unavailable; it is optional enrichment.
pub async fn extract_signals(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> ApiResult<Json<Option<ExtractionResult>>> {
    if request.transcript.trim().is_empty() {
        return Err(ApiError::BadRequest("transcript is empty".to_string()));
    }
    let label = request.label.as_deref().unwrap_or("answer");
    Ok(Json(state.extractor.extract(&request.transcript, label).await))
}

/// POST /transcribe
pub async fn transcribe_audio(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> ApiResult<Json<TranscribeResponse>> {
    let audio = decode_audio(&request.audio_base64)?;
    let transcript = state
        .transcriber
        .transcribe(audio, &request.mime_type)
        .await?;
    Ok(Json(TranscribeResponse { transcript }))
}

/// POST /resources
pub async fn find_resources(
    State(state): State<AppState>,
    Json(request): Json<ResourcesRequest>,
) -> ApiResult<Json<ResourcesResponse>> {
    let resources = state
        .resource_finder
        .find(&request.question, &request.focus_areas)
        .await?;
    Ok(Json(ResourcesResponse { resources }))
}

fn decode_audio(encoded: &str) -> ApiResult<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("audio_base64 is not valid base64: {}", e)))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/evaluate", post(evaluate_session))
        .route("/extract", post(extract_signals))
        .route("/transcribe", post(transcribe_audio))
        .route("/resources", post(find_resources))
}
