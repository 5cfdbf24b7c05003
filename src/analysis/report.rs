//! The normalized analysis report and its derived review status.

use serde::{Deserialize, Serialize};

/// Score above which a result is approved.
const APPROVAL_THRESHOLD: f64 = 70.0;

/// The structured shape every analysis is normalized into.
///
/// `score` is required and must be numeric: a model reply without one fails
/// normalization instead of being silently defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    pub score: f64,
    #[serde(default)]
    pub guidelines: Vec<String>,
}

impl AnalysisReport {
    /// Score clamped to the 0-100 range the model is instructed to use but
    /// not inherently bound by.
    pub fn clamped_score(&self) -> f64 {
        self.score.clamp(0.0, 100.0)
    }

    /// Review status derived from the clamped score.
    pub fn status(&self) -> ReviewStatus {
        ReviewStatus::from_score(self.clamped_score())
    }
}

/// Outcome of a compliance review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Approved,
    Reject,
}

impl ReviewStatus {
    /// Approved iff the score is strictly above the threshold.
    pub fn from_score(score: f64) -> Self {
        if score > APPROVAL_THRESHOLD {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Reject
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Approved => write!(f, "Approved"),
            ReviewStatus::Reject => write!(f, "Reject"),
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Approved" => Ok(ReviewStatus::Approved),
            "Reject" => Ok(ReviewStatus::Reject),
            other => Err(format!("unknown review status '{other}'")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
