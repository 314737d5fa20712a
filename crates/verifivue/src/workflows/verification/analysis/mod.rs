mod policy;

pub use policy::{AnalysisPolicy, REVIEW_CONFIDENCE_THRESHOLD};

use serde::{Deserialize, Serialize};

use super::domain::AnalysisResult;

/// Automatic routing decision derived from an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Pass,
    NeedsReview,
}

/// Stateless gate applying the review policy to analysis output.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisGate {
    policy: AnalysisPolicy,
}

impl AnalysisGate {
    pub fn new(policy: AnalysisPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AnalysisPolicy {
        &self.policy
    }

    pub fn evaluate(&self, result: &AnalysisResult) -> GateDecision {
        if result.is_tampered
            || result.confidence_score < self.policy.review_confidence_threshold()
        {
            GateDecision::NeedsReview
        } else {
            GateDecision::Pass
        }
    }

    /// Analysis-stage description recorded on the timeline for a decision.
    pub fn describe(&self, result: &AnalysisResult, decision: GateDecision) -> String {
        match decision {
            GateDecision::Pass => format!(
                "AI verification passed. Confidence: {}%.",
                result.confidence_score
            ),
            GateDecision::NeedsReview if result.is_tampered => format!(
                "Possible tampering detected (confidence {}%). Human review needed.",
                result.confidence_score
            ),
            GateDecision::NeedsReview => format!(
                "Low confidence score ({}%). Human review needed.",
                result.confidence_score
            ),
        }
    }
}
