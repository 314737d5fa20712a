use serde::{Deserialize, Serialize};

use crate::config::VerificationConfig;

/// Confidence scores below this value are routed to human review.
pub const REVIEW_CONFIDENCE_THRESHOLD: u8 = 80;

/// Policy dial backing the analysis gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPolicy {
    review_confidence_threshold: u8,
}

impl AnalysisPolicy {
    pub fn new(review_confidence_threshold: u8) -> Self {
        Self {
            review_confidence_threshold: review_confidence_threshold.min(100),
        }
    }

    pub fn review_confidence_threshold(&self) -> u8 {
        self.review_confidence_threshold
    }
}

impl Default for AnalysisPolicy {
    fn default() -> Self {
        Self::new(REVIEW_CONFIDENCE_THRESHOLD)
    }
}

impl From<&VerificationConfig> for AnalysisPolicy {
    fn from(config: &VerificationConfig) -> Self {
        Self::new(config.review_confidence_threshold)
    }
}
