//! Prompt construction
//!
//! Prompts are assembled from named, typed sections instead of ad hoc
//! string concatenation, so their content can be tested without a provider.

use crate::error::CallError;
use crate::models::{
    EvidenceItem, ExtractionResult, GoldenPathStep, InterviewQuestion, InterviewType, Qualifier,
};
use serde_json::{json, Value};
use std::fmt::Write as _;
use thiserror::Error;

/// Prompt assembly failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing prompt section: {0}")]
    MissingSection(&'static str),

    #[error("failed to render prompt section {section}: {message}")]
    Render {
        section: &'static str,
        message: String,
    },
}

impl From<PromptError> for CallError {
    fn from(err: PromptError) -> Self {
        CallError::InvalidRequest(err.to_string())
    }
}

/// One titled block of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSection {
    pub title: &'static str,
    pub body: String,
}

/// Ordered prompt sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    sections: Vec<PromptSection>,
}

impl Prompt {
    pub fn sections(&self) -> &[PromptSection] {
        &self.sections
    }

    /// Body of the section titled `title`
    pub fn section(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.body.as_str())
    }

    /// Final prompt text
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            let _ = write!(out, "## {}\n{}", section.title, section.body);
        }
        out
    }
}

pub const SECTION_ROLE: &str = "Role";
pub const SECTION_QUESTION: &str = "Interview question";
pub const SECTION_INITIAL: &str = "Initial answer";
pub const SECTION_DEFENSE: &str = "Defense";
pub const SECTION_RUBRIC: &str = "Rubric";
pub const SECTION_GOLDEN_PATH: &str = "Golden path";
pub const SECTION_OUTPUT: &str = "Output format";
pub const SECTION_TRANSCRIPT: &str = "Transcript";

const EXTRACTION_ROLE: &str = "You are an evidence extractor for product management interview \
practice. Do NOT score or judge the answer. Extract, comprehensively and verbatim, every quote \
that is evidence for one of the buckets below. Quote the transcript exactly; never paraphrase.";

const EXTRACTION_OUTPUT: &str = "Return a JSON object with the arrays frameworks, metrics, \
claims, weaknesses, strengths, hedging, structure_signals and missing_elements. Every item is \
{\"quote\": string, \"category\": string, \"qualifier\": boolean or \"low\"|\"medium\"|\"high\"}. \
For metrics the qualifier says whether the metric was quantified, for claims whether it was \
supported, for weaknesses and missing_elements it is the severity. missing_elements quote the \
closest related text or are empty strings. Use empty arrays for empty buckets.";

const EVALUATION_ROLE: &str = "You are a demanding interviewer at a top technology company \
evaluating a product management interview. Ground every judgement in the candidate's own words. \
Scores are integers from 0 to 100.";

const EVALUATION_OUTPUT: &str = "Respond with ONLY a JSON object of this shape:\n\
{\n  \"rubric\": [{\"category\": string, \"score\": number, \"justification\": string}],\n  \
\"communication\": {\"clarity\": number, \"structure\": number, \"confidence\": number, \"conciseness\": number},\n  \
\"initial_annotations\": [{\"quote\": string, \"kind\": \"strength\"|\"weakness\"|\"neutral\", \"comment\": string}],\n  \
\"defense_annotations\": [{\"quote\": string, \"kind\": \"strength\"|\"weakness\"|\"neutral\", \"comment\": string}],\n  \
\"golden_path\": <the golden path above, unmodified>,\n  \
\"summary\": string,\n  \"defense_feedback\": string,\n  \"improvement_tips\": [string]\n}\n\
Do not include overall, vision or defense totals; they are computed separately.";

/// Prompt for the evidence extraction pass over one transcript
#[derive(Debug, Clone)]
pub struct ExtractionPrompt<'a> {
    pub label: &'a str,
    pub transcript: &'a str,
}

impl<'a> ExtractionPrompt<'a> {
    pub fn new(label: &'a str, transcript: &'a str) -> Self {
        Self { label, transcript }
    }

    pub fn build(&self) -> Result<Prompt, PromptError> {
        if self.transcript.trim().is_empty() {
            return Err(PromptError::MissingSection(SECTION_TRANSCRIPT));
        }

        Ok(Prompt {
            sections: vec![
                PromptSection {
                    title: SECTION_ROLE,
                    body: format!("{}\nThis transcript is the candidate's {}.", EXTRACTION_ROLE, self.label),
                },
                PromptSection {
                    title: SECTION_TRANSCRIPT,
                    body: self.transcript.trim().to_string(),
                },
                PromptSection {
                    title: SECTION_OUTPUT,
                    body: EXTRACTION_OUTPUT.to_string(),
                },
            ],
        })
    }

    /// Response schema for constrained output mode
    pub fn response_schema() -> Value {
        let item = json!({
            "type": "OBJECT",
            "properties": {
                "quote": {"type": "STRING"},
                "category": {"type": "STRING"},
                "qualifier": {"type": "STRING"}
            },
            "required": ["quote", "category"]
        });
        let bucket = json!({"type": "ARRAY", "items": item});
        let buckets = [
            "frameworks",
            "metrics",
            "claims",
            "weaknesses",
            "strengths",
            "hedging",
            "structure_signals",
            "missing_elements",
        ];

        let properties: serde_json::Map<String, Value> = buckets
            .iter()
            .map(|name| (name.to_string(), bucket.clone()))
            .collect();

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": buckets,
        })
    }
}

/// Transcript plus the evidence extracted from it, if any
#[derive(Debug, Clone, Copy)]
struct AnswerSection<'a> {
    transcript: &'a str,
    evidence: Option<&'a ExtractionResult>,
}

/// Builder for the composite session evaluation prompt
///
/// The rubric and golden path come from the interview type; question and
/// both transcripts are required.
#[derive(Debug, Clone)]
pub struct EvaluationPromptBuilder<'a> {
    interview_type: InterviewType,
    question: Option<&'a InterviewQuestion>,
    follow_up: Option<&'a str>,
    initial: Option<AnswerSection<'a>>,
    defense: Option<AnswerSection<'a>>,
    golden_path: Vec<GoldenPathStep>,
}

impl<'a> EvaluationPromptBuilder<'a> {
    pub fn new(interview_type: InterviewType) -> Self {
        Self {
            interview_type,
            question: None,
            follow_up: None,
            initial: None,
            defense: None,
            golden_path: interview_type.golden_path(),
        }
    }

    pub fn question(mut self, question: &'a InterviewQuestion) -> Self {
        self.question = Some(question);
        self
    }

    /// Challenge the interviewer posed before the defense
    pub fn follow_up(mut self, follow_up: Option<&'a str>) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn initial_answer(
        mut self,
        transcript: &'a str,
        evidence: Option<&'a ExtractionResult>,
    ) -> Self {
        self.initial = Some(AnswerSection {
            transcript,
            evidence,
        });
        self
    }

    pub fn defense_answer(
        mut self,
        transcript: &'a str,
        evidence: Option<&'a ExtractionResult>,
    ) -> Self {
        self.defense = Some(AnswerSection {
            transcript,
            evidence,
        });
        self
    }

    pub fn build(self) -> Result<Prompt, PromptError> {
        let question = self
            .question
            .filter(|q| !q.text.trim().is_empty())
            .ok_or(PromptError::MissingSection(SECTION_QUESTION))?;
        let initial = self
            .initial
            .filter(|a| !a.transcript.trim().is_empty())
            .ok_or(PromptError::MissingSection(SECTION_INITIAL))?;
        let defense = self
            .defense
            .filter(|a| !a.transcript.trim().is_empty())
            .ok_or(PromptError::MissingSection(SECTION_DEFENSE))?;

        let golden_path =
            serde_json::to_string_pretty(&self.golden_path).map_err(|e| PromptError::Render {
                section: SECTION_GOLDEN_PATH,
                message: e.to_string(),
            })?;

        let mut question_body = question.text.trim().to_string();
        if let Some(context) = question.context.as_deref().filter(|c| !c.trim().is_empty()) {
            let _ = write!(question_body, "\nContext: {}", context.trim());
        }

        let mut defense_body = String::new();
        if let Some(follow_up) = self.follow_up.filter(|f| !f.trim().is_empty()) {
            let _ = writeln!(defense_body, "Interviewer challenge: {}\n", follow_up.trim());
        }
        defense_body.push_str(&render_answer(defense));

        Ok(Prompt {
            sections: vec![
                PromptSection {
                    title: SECTION_ROLE,
                    body: format!(
                        "{}\nInterview type: {}.",
                        EVALUATION_ROLE,
                        self.interview_type.label()
                    ),
                },
                PromptSection {
                    title: SECTION_QUESTION,
                    body: question_body,
                },
                PromptSection {
                    title: SECTION_INITIAL,
                    body: render_answer(initial),
                },
                PromptSection {
                    title: SECTION_DEFENSE,
                    body: defense_body,
                },
                PromptSection {
                    title: SECTION_RUBRIC,
                    body: render_rubric(self.interview_type),
                },
                PromptSection {
                    title: SECTION_GOLDEN_PATH,
                    body: format!(
                        "Echo this reference structure back unmodified in \"golden_path\":\n{}",
                        golden_path
                    ),
                },
                PromptSection {
                    title: SECTION_OUTPUT,
                    body: EVALUATION_OUTPUT.to_string(),
                },
            ],
        })
    }
}

fn render_answer(answer: AnswerSection<'_>) -> String {
    let transcript = answer.transcript.trim();
    match answer.evidence.filter(|e| !e.is_empty()) {
        Some(evidence) => format!(
            "Extracted evidence (verbatim quotes):\n{}\nFull transcript:\n{}",
            render_evidence(evidence),
            transcript
        ),
        None => transcript.to_string(),
    }
}

/// Non-empty evidence buckets as indented quote lists
pub fn render_evidence(evidence: &ExtractionResult) -> String {
    let mut out = String::new();
    for (name, items) in evidence.buckets() {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", name);
        for item in items {
            let _ = writeln!(out, "  - {}", render_item(item));
        }
    }
    out
}

fn render_item(item: &EvidenceItem) -> String {
    let mut line = format!("\"{}\"", item.quote);
    if !item.category.is_empty() {
        let _ = write!(line, " [{}]", item.category);
    }
    match item.qualifier {
        Some(Qualifier::Flag(true)) => line.push_str(" (yes)"),
        Some(Qualifier::Flag(false)) => line.push_str(" (no)"),
        Some(Qualifier::Severity(severity)) => {
            let _ = write!(line, " (severity: {:?})", severity);
        }
        None => {}
    }
    line
}

fn render_rubric(interview_type: InterviewType) -> String {
    let categories = interview_type.rubric_categories();
    let mut out = String::from(
        "Score every category below, in exactly this order, using these exact names. \
The last category measures how well the candidate defended the answer under pressure.\n",
    );
    for (idx, category) in categories.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", idx + 1, category);
    }
    out
}
