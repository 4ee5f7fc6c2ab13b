//! Data models for icoach-ai
//!
//! - Extraction pass output (evidence snippets per transcript)
//! - Interview types with their fixed rubrics and golden paths
//! - Session evaluation request/result

pub mod extraction;
pub mod rubric;
pub mod session;

pub use extraction::{EvidenceItem, ExtractionResult, Qualifier, Severity};
pub use rubric::{GoldenPathStep, InterviewType};
pub use session::{
    AnnotationKind, CommunicationScores, InterviewQuestion, RubricScore, SessionRequest,
    SessionResult, TranscriptAnnotation,
};
