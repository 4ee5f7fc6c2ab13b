//! Session evaluation request and result

use super::rubric::{GoldenPathStep, InterviewType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Interview question being answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub text: String,
    /// Extra framing shown to the candidate (company, product, constraints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One interview session to evaluate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub interview_type: InterviewType,
    pub question: InterviewQuestion,
    /// Transcript of the initial answer
    pub initial_transcript: String,
    /// Follow-up challenge posed to the candidate, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    /// Transcript of the candidate defending the answer
    pub defense_transcript: String,
}

/// Model-assigned score for one rubric category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    pub category: String,
    /// 0-100
    pub score: f64,
    #[serde(default)]
    pub justification: String,
}

/// Delivery sub-scores, each 0-100
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationScores {
    pub clarity: f64,
    pub structure: f64,
    pub confidence: f64,
    pub conciseness: f64,
}

impl CommunicationScores {
    pub fn values(&self) -> [f64; 4] {
        [self.clarity, self.structure, self.confidence, self.conciseness]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Strength,
    Weakness,
    #[default]
    #[serde(other)]
    Neutral,
}

/// Feedback pinned to a verbatim span of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptAnnotation {
    pub quote: String,
    #[serde(default)]
    pub kind: AnnotationKind,
    #[serde(default)]
    pub comment: String,
}

/// Final evaluation of a session
///
/// `overall_score`, `vision_score`, `defense_score`, `strengths` and
/// `weaknesses` are derived locally from `rubric` and `communication`;
/// model-emitted aggregates are never used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub id: Uuid,
    pub interview_type: InterviewType,
    pub question: InterviewQuestion,
    /// In model emission order
    pub rubric: Vec<RubricScore>,
    pub communication: CommunicationScores,
    pub initial_annotations: Vec<TranscriptAnnotation>,
    pub defense_annotations: Vec<TranscriptAnnotation>,
    pub golden_path: Vec<GoldenPathStep>,
    pub summary: String,
    pub defense_feedback: String,
    pub improvement_tips: Vec<String>,
    pub overall_score: u8,
    pub vision_score: u8,
    pub defense_score: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    /// Model that produced the evaluation
    pub model: String,
    pub evaluated_at: DateTime<Utc>,
}
