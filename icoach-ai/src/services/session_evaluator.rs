//! Session evaluation pipeline
//!
//! **Flow:**
//! 1. Extract evidence from both transcripts concurrently (failures tolerated)
//! 2. Build the composite evaluation prompt
//! 3. Primary model call, direct (bypasses the shared queue) with its own
//!    retry policy. Any failure falls through to step 4.
//! 4. Fallback model call through the shared queue and retrier. Failure is
//!    returned to the caller.
//! 5. Parse the response; unparseable output from a successful call is
//!    [`CallError::CriticalJson`]
//! 6. Derive overall, vision and defense scores locally
//!
//! Phase transitions are published on the event bus as
//! `pending -> extracting -> primary_attempt -> [fallback_attempt ->] succeeded | failed`.

use super::backoff_retrier::{with_backoff, RetryPolicy};
use super::prompts::EvaluationPromptBuilder;
use super::provider::{GenerateRequest, GenerationConfig, GenerativeModel, ModelResponse};
use super::rate_limited_queue::RateLimitedQueue;
use super::response_extractor::extract_json;
use super::signal_extractor::SignalExtractor;
use crate::error::CallError;
use crate::models::{
    CommunicationScores, RubricScore, SessionRequest, SessionResult, TranscriptAnnotation,
};
use chrono::Utc;
use icoach_common::events::{EvaluationEvent, EvaluationPhase, EventBus};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Weight of the rubric mean in the overall score
const RUBRIC_WEIGHT: f64 = 0.8;
/// Weight of the communication mean in the overall score
const COMMUNICATION_WEIGHT: f64 = 0.2;
/// Rubric categories at or above this score are strengths
pub const STRENGTH_THRESHOLD: f64 = 80.0;
/// Rubric categories below this score are weaknesses
pub const WEAKNESS_THRESHOLD: f64 = 60.0;

/// Models and retry limits for the two evaluation calls
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub primary_model: String,
    pub fallback_model: String,
    pub primary_retry: RetryPolicy,
    pub fallback_retry: RetryPolicy,
    /// Thinking effort hint for the primary call
    pub thinking_budget: Option<i32>,
}

/// Model output for one evaluation
///
/// Any aggregate scores the model might add are ignored by serde.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationOutput {
    pub rubric: Vec<RubricScore>,
    #[serde(default)]
    pub communication: CommunicationScores,
    #[serde(default)]
    pub initial_annotations: Vec<TranscriptAnnotation>,
    #[serde(default)]
    pub defense_annotations: Vec<TranscriptAnnotation>,
    #[serde(default)]
    pub golden_path: Option<Value>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub defense_feedback: String,
    #[serde(default)]
    pub improvement_tips: Vec<String>,
}

/// Scores computed locally from model sub-scores
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedScores {
    pub overall: u8,
    pub vision: u8,
    pub defense: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

/// Orchestrates one full session evaluation
pub struct SessionEvaluator {
    model: Arc<dyn GenerativeModel>,
    queue: RateLimitedQueue,
    extractor: Arc<SignalExtractor>,
    config: EvaluatorConfig,
    events: EventBus,
}

impl SessionEvaluator {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        queue: RateLimitedQueue,
        extractor: Arc<SignalExtractor>,
        config: EvaluatorConfig,
        events: EventBus,
    ) -> Self {
        Self {
            model,
            queue,
            extractor,
            config,
            events,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate one session
    ///
    /// Errors: [`CallError::InvalidRequest`] for a missing question or
    /// transcript, the fallback call's error when both calls fail, or
    /// [`CallError::CriticalJson`] when no successful response parses.
    pub async fn evaluate(&self, request: &SessionRequest) -> Result<SessionResult, CallError> {
        let evaluation_id = Uuid::new_v4();
        self.phase(evaluation_id, EvaluationPhase::Pending);

        match self.run(evaluation_id, request).await {
            Ok(result) => {
                self.phase(evaluation_id, EvaluationPhase::Succeeded);
                self.events.emit_lossy(EvaluationEvent::EvaluationCompleted {
                    evaluation_id,
                    overall_score: result.overall_score,
                    model: result.model.clone(),
                    timestamp: Utc::now(),
                });
                info!(
                    evaluation_id = %evaluation_id,
                    model = %result.model,
                    overall = result.overall_score,
                    vision = result.vision_score,
                    defense = result.defense_score,
                    "Session evaluated"
                );
                Ok(result)
            }
            Err(err) => {
                self.phase(evaluation_id, EvaluationPhase::Failed);
                self.events.emit_lossy(EvaluationEvent::EvaluationFailed {
                    evaluation_id,
                    tag: err.tag().map(str::to_string),
                    message: err.to_string(),
                    timestamp: Utc::now(),
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        evaluation_id: Uuid,
        request: &SessionRequest,
    ) -> Result<SessionResult, CallError> {
        // Reject bad input before spending any provider calls
        EvaluationPromptBuilder::new(request.interview_type)
            .question(&request.question)
            .initial_answer(&request.initial_transcript, None)
            .defense_answer(&request.defense_transcript, None)
            .build()?;

        self.phase(evaluation_id, EvaluationPhase::Extracting);
        let (initial_evidence, defense_evidence) = tokio::join!(
            self.extractor
                .extract(&request.initial_transcript, "initial answer"),
            self.extractor.extract(&request.defense_transcript, "defense"),
        );

        let prompt = EvaluationPromptBuilder::new(request.interview_type)
            .question(&request.question)
            .follow_up(request.follow_up.as_deref())
            .initial_answer(&request.initial_transcript, initial_evidence.as_ref())
            .defense_answer(&request.defense_transcript, defense_evidence.as_ref())
            .build()?
            .render();

        self.phase(evaluation_id, EvaluationPhase::PrimaryAttempt);
        let primary = match self.call_primary(&prompt).await {
            Ok(response) => {
                let parsed = parse_evaluation(&response.text);
                if parsed.is_none() {
                    warn!(
                        evaluation_id = %evaluation_id,
                        model = %self.config.primary_model,
                        "Primary evaluation output unparseable, falling back to {}",
                        self.config.fallback_model
                    );
                }
                parsed.map(|output| (output, self.config.primary_model.clone()))
            }
            Err(err) => {
                warn!(
                    evaluation_id = %evaluation_id,
                    model = %self.config.primary_model,
                    tag = err.tag().unwrap_or("none"),
                    error = %err,
                    "Primary evaluation call failed, falling back to {}",
                    self.config.fallback_model
                );
                None
            }
        };

        let (output, model_used) = match primary {
            Some(found) => found,
            None => {
                self.phase(evaluation_id, EvaluationPhase::FallbackAttempt);
                let response = self.call_fallback(&prompt).await?;
                let output = parse_evaluation(&response.text).ok_or_else(|| {
                    CallError::CriticalJson(format!(
                        "evaluation output from {} could not be parsed and no fallback remains",
                        self.config.fallback_model
                    ))
                })?;
                (output, self.config.fallback_model.clone())
            }
        };

        Ok(assemble_result(evaluation_id, request, output, model_used))
    }

    async fn call_primary(&self, prompt: &str) -> Result<ModelResponse, CallError> {
        let mut config = GenerationConfig::json();
        if let Some(budget) = self.config.thinking_budget {
            config = config.with_thinking_budget(budget);
        }
        let request = GenerateRequest::text(&self.config.primary_model, prompt).with_config(config);

        with_backoff(&self.config.primary_retry, || {
            self.model.generate(request.clone())
        })
        .await
    }

    async fn call_fallback(&self, prompt: &str) -> Result<ModelResponse, CallError> {
        let request = GenerateRequest::text(&self.config.fallback_model, prompt)
            .with_config(GenerationConfig::json());

        self.queue
            .call(
                Arc::clone(&self.model),
                request,
                self.config.fallback_retry.clone(),
            )
            .await
    }

    fn phase(&self, evaluation_id: Uuid, phase: EvaluationPhase) {
        debug!(evaluation_id = %evaluation_id, phase = ?phase, "Evaluation phase");
        self.events
            .emit_lossy(EvaluationEvent::phase_changed(evaluation_id, phase));
    }
}

/// Parse model text into an [`EvaluationOutput`]
///
/// `None` when no JSON can be recovered, the JSON has the wrong shape, or
/// the rubric is empty.
pub fn parse_evaluation(text: &str) -> Option<EvaluationOutput> {
    let value = extract_json(text)?;
    match serde_json::from_value::<EvaluationOutput>(value) {
        Ok(output) if output.rubric.is_empty() => {
            debug!("Evaluation output has an empty rubric");
            None
        }
        Ok(output) => Some(output),
        Err(e) => {
            debug!(error = %e, "Evaluation output did not match the expected shape");
            None
        }
    }
}

/// Clamp a model-emitted score into 0-100; non-finite becomes 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round_score(value: f64) -> u8 {
    clamp_score(value).round() as u8
}

/// Derive aggregate scores from (already clamped) sub-scores
///
/// The defense score is read positionally from the LAST rubric item,
/// whatever its label. This relies on the prompt listing the defense
/// category last and the model preserving that order.
pub fn derive_scores(rubric: &[RubricScore], communication: &CommunicationScores) -> DerivedScores {
    let rubric_mean = mean(rubric.iter().map(|r| r.score));
    let communication_mean = mean(communication.values());

    let overall = round_score(RUBRIC_WEIGHT * rubric_mean + COMMUNICATION_WEIGHT * communication_mean);

    let vision = match rubric.split_last() {
        Some((_, rest)) if !rest.is_empty() => round_score(mean(rest.iter().map(|r| r.score))),
        _ => round_score(rubric_mean),
    };

    let defense = rubric.last().map(|r| round_score(r.score)).unwrap_or(0);

    let strengths = rubric
        .iter()
        .filter(|r| r.score >= STRENGTH_THRESHOLD)
        .map(|r| r.category.clone())
        .collect();
    let weaknesses = rubric
        .iter()
        .filter(|r| r.score < WEAKNESS_THRESHOLD)
        .map(|r| r.category.clone())
        .collect();

    DerivedScores {
        overall,
        vision,
        defense,
        strengths,
        weaknesses,
    }
}

fn assemble_result(
    evaluation_id: Uuid,
    request: &SessionRequest,
    output: EvaluationOutput,
    model: String,
) -> SessionResult {
    let rubric: Vec<RubricScore> = output
        .rubric
        .into_iter()
        .map(|r| RubricScore {
            score: clamp_score(r.score),
            ..r
        })
        .collect();
    let c = output.communication;
    let communication = CommunicationScores {
        clarity: clamp_score(c.clarity),
        structure: clamp_score(c.structure),
        confidence: clamp_score(c.confidence),
        conciseness: clamp_score(c.conciseness),
    };

    let scores = derive_scores(&rubric, &communication);

    let golden_path = request.interview_type.golden_path();
    if let Some(echoed) = &output.golden_path {
        let matches = serde_json::to_value(&golden_path)
            .map(|local| &local == echoed)
            .unwrap_or(false);
        if !matches {
            debug!(evaluation_id = %evaluation_id, "Model altered the golden path echo, using the fixed one");
        }
    }

    SessionResult {
        id: evaluation_id,
        interview_type: request.interview_type,
        question: request.question.clone(),
        rubric,
        communication,
        initial_annotations: output.initial_annotations,
        defense_annotations: output.defense_annotations,
        golden_path,
        summary: output.summary,
        defense_feedback: output.defense_feedback,
        improvement_tips: output.improvement_tips,
        overall_score: scores.overall,
        vision_score: scores.vision,
        defense_score: scores.defense,
        strengths: scores.strengths,
        weaknesses: scores.weaknesses,
        model,
        evaluated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnnotationKind, InterviewQuestion, InterviewType};

    fn rubric(scores: &[f64]) -> Vec<RubricScore> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| RubricScore {
                category: format!("Category {}", i + 1),
                score: *s,
                justification: String::new(),
            })
            .collect()
    }

    fn flat_communication(score: f64) -> CommunicationScores {
        CommunicationScores {
            clarity: score,
            structure: score,
            confidence: score,
            conciseness: score,
        }
    }

    #[test]
    fn test_overall_weights_rubric_and_communication() {
        let scores = derive_scores(&rubric(&[90.0, 80.0, 70.0, 60.0]), &flat_communication(80.0));
        // round(0.8 * 75 + 0.2 * 80) = 76
        assert_eq!(scores.overall, 76);
    }

    #[test]
    fn test_vision_excludes_last_item() {
        let scores = derive_scores(&rubric(&[90.0, 80.0, 70.0, 60.0]), &flat_communication(80.0));
        assert_eq!(scores.vision, 80);
    }

    #[test]
    fn test_defense_is_last_item_regardless_of_label() {
        let mut items = rubric(&[90.0, 42.0, 70.0]);
        items[2].category = "Goal Definition".to_string();
        items[1].category = "Defense & Adaptability".to_string();

        let scores = derive_scores(&items, &flat_communication(50.0));

        assert_eq!(scores.defense, 70);
    }

    #[test]
    fn test_strength_and_weakness_thresholds() {
        let scores = derive_scores(&rubric(&[80.0, 79.9, 60.0, 59.0]), &flat_communication(0.0));
        assert_eq!(scores.strengths, vec!["Category 1".to_string()]);
        assert_eq!(scores.weaknesses, vec!["Category 4".to_string()]);
    }

    #[test]
    fn test_single_item_rubric_vision_is_mean_of_all() {
        let scores = derive_scores(&rubric(&[64.0]), &flat_communication(0.0));
        assert_eq!(scores.vision, 64);
        assert_eq!(scores.defense, 64);
    }

    #[test]
    fn test_empty_inputs_yield_zero() {
        let scores = derive_scores(&[], &CommunicationScores::default());
        assert_eq!(scores.overall, 0);
        assert_eq!(scores.vision, 0);
        assert_eq!(scores.defense, 0);
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(120.0), 100.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(55.5), 55.5);
    }

    #[test]
    fn test_parse_evaluation_ignores_model_aggregates() {
        let text = r#"```json
{"rubric": [{"category": "A", "score": 70, "justification": "ok"}],
 "overall_score": 99,
 "communication": {"clarity": 60, "structure": 60, "confidence": 60, "conciseness": 60},
 "summary": "fine"}
```"#;
        let output = parse_evaluation(text).unwrap();
        assert_eq!(output.rubric.len(), 1);
        assert_eq!(output.summary, "fine");
    }

    #[test]
    fn test_parse_evaluation_rejects_empty_rubric_and_bad_shape() {
        assert!(parse_evaluation(r#"{"rubric": []}"#).is_none());
        assert!(parse_evaluation(r#"{"summary": "no rubric"}"#).is_none());
        assert!(parse_evaluation("not json").is_none());
    }

    #[test]
    fn test_assemble_result_clamps_and_fixes_golden_path() {
        let request = SessionRequest {
            interview_type: InterviewType::Execution,
            question: InterviewQuestion {
                text: "Why did DAU drop?".to_string(),
                context: None,
            },
            initial_transcript: "a".to_string(),
            follow_up: None,
            defense_transcript: "b".to_string(),
        };
        let output = EvaluationOutput {
            rubric: rubric(&[150.0, 50.0]),
            communication: flat_communication(-10.0),
            initial_annotations: vec![TranscriptAnnotation {
                quote: "a".to_string(),
                kind: AnnotationKind::Strength,
                comment: String::new(),
            }],
            defense_annotations: Vec::new(),
            golden_path: Some(serde_json::json!([{"step": 1, "title": "Made up"}])),
            summary: String::new(),
            defense_feedback: String::new(),
            improvement_tips: Vec::new(),
        };

        let result = assemble_result(Uuid::new_v4(), &request, output, "m".to_string());

        assert_eq!(result.rubric[0].score, 100.0);
        assert_eq!(result.communication.clarity, 0.0);
        // round(0.8 * 75 + 0.2 * 0) = 60
        assert_eq!(result.overall_score, 60);
        assert_eq!(result.defense_score, 50);
        assert_eq!(result.golden_path, InterviewType::Execution.golden_path());
    }
}
