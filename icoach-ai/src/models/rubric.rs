//! Interview types, their fixed rubric categories and golden paths
//!
//! Category order matters: the LAST category of every rubric is the
//! defending-under-pressure dimension. Score derivation reads the defense
//! score positionally from the model's echo of this order.

use serde::{Deserialize, Serialize};

/// Interview format being practiced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    ProductSense,
    Execution,
    Strategy,
    Behavioral,
}

const PRODUCT_SENSE_RUBRIC: &[&str] = &[
    "Goal Definition",
    "User Segmentation",
    "Problem Prioritization",
    "Solution Creativity",
    "Metrics & Tradeoffs",
    "Defense & Adaptability",
];

const EXECUTION_RUBRIC: &[&str] = &[
    "Goal Definition",
    "Metric Framework",
    "Root Cause Analysis",
    "Tradeoff Reasoning",
    "Defense & Adaptability",
];

const STRATEGY_RUBRIC: &[&str] = &[
    "Market Framing",
    "Competitive Analysis",
    "Strategic Options",
    "Risk Assessment",
    "Defense & Adaptability",
];

const BEHAVIORAL_RUBRIC: &[&str] = &[
    "Situation Clarity",
    "Ownership & Action",
    "Measurable Impact",
    "Reflection & Learning",
    "Defense & Adaptability",
];

/// One step of the reference answer structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenPathStep {
    pub step: u8,
    pub title: String,
    pub description: String,
}

impl GoldenPathStep {
    fn new(step: u8, title: &str, description: &str) -> Self {
        Self {
            step,
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

impl InterviewType {
    pub fn label(&self) -> &'static str {
        match self {
            InterviewType::ProductSense => "Product Sense",
            InterviewType::Execution => "Execution",
            InterviewType::Strategy => "Strategy",
            InterviewType::Behavioral => "Behavioral",
        }
    }

    /// Fixed rubric categories in prompt order
    pub fn rubric_categories(&self) -> &'static [&'static str] {
        match self {
            InterviewType::ProductSense => PRODUCT_SENSE_RUBRIC,
            InterviewType::Execution => EXECUTION_RUBRIC,
            InterviewType::Strategy => STRATEGY_RUBRIC,
            InterviewType::Behavioral => BEHAVIORAL_RUBRIC,
        }
    }

    /// Category scored as the defense dimension (always last)
    pub fn defense_category(&self) -> &'static str {
        let categories = self.rubric_categories();
        categories[categories.len() - 1]
    }

    /// Fixed reference structure of an ideal answer
    pub fn golden_path(&self) -> Vec<GoldenPathStep> {
        match self {
            InterviewType::ProductSense => vec![
                GoldenPathStep::new(1, "Clarify", "Restate the prompt and confirm scope, platform and constraints."),
                GoldenPathStep::new(2, "Set the goal", "Tie the product to a mission-level goal before proposing anything."),
                GoldenPathStep::new(3, "Segment users", "Pick distinct user segments and choose one with a stated reason."),
                GoldenPathStep::new(4, "Prioritize pain points", "List the segment's problems and rank them by impact."),
                GoldenPathStep::new(5, "Generate solutions", "Offer several solutions, then select one against clear criteria."),
                GoldenPathStep::new(6, "Define success", "Name a north-star metric, guardrails and the main tradeoff."),
            ],
            InterviewType::Execution => vec![
                GoldenPathStep::new(1, "Clarify the metric", "Define the metric precisely and the time window of the change."),
                GoldenPathStep::new(2, "Rule out artifacts", "Check instrumentation, data pipelines and seasonality first."),
                GoldenPathStep::new(3, "Segment the change", "Break the movement down by platform, region and user cohort."),
                GoldenPathStep::new(4, "Form hypotheses", "Rank internal and external causes by likelihood."),
                GoldenPathStep::new(5, "Decide and measure", "Recommend an action with the tradeoff and the metric that verifies it."),
            ],
            InterviewType::Strategy => vec![
                GoldenPathStep::new(1, "Frame the market", "Size the opportunity and state why it matters now."),
                GoldenPathStep::new(2, "Map the landscape", "Identify competitors, substitutes and the company's right to win."),
                GoldenPathStep::new(3, "Lay out options", "Describe distinct strategic options including doing nothing."),
                GoldenPathStep::new(4, "Weigh risks", "Compare options on risk, cost and reversibility."),
                GoldenPathStep::new(5, "Commit", "Recommend one option with milestones and kill criteria."),
            ],
            InterviewType::Behavioral => vec![
                GoldenPathStep::new(1, "Situation", "Set the context briefly with the stakes involved."),
                GoldenPathStep::new(2, "Task", "State your specific responsibility."),
                GoldenPathStep::new(3, "Action", "Describe what you personally did and why."),
                GoldenPathStep::new(4, "Result", "Quantify the outcome."),
                GoldenPathStep::new(5, "Reflection", "Share what you learned and would do differently."),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [InterviewType; 4] = [
        InterviewType::ProductSense,
        InterviewType::Execution,
        InterviewType::Strategy,
        InterviewType::Behavioral,
    ];

    #[test]
    fn test_every_rubric_ends_with_defense() {
        for kind in ALL {
            assert_eq!(kind.defense_category(), "Defense & Adaptability");
            assert!(kind.rubric_categories().len() >= 2);
        }
    }

    #[test]
    fn test_golden_paths_are_numbered_in_order() {
        for kind in ALL {
            let path = kind.golden_path();
            assert!(!path.is_empty());
            for (i, step) in path.iter().enumerate() {
                assert_eq!(step.step as usize, i + 1);
            }
        }
    }

    #[test]
    fn test_serde_names() {
        let kind: InterviewType = serde_json::from_str("\"product_sense\"").unwrap();
        assert_eq!(kind, InterviewType::ProductSense);
    }
}
