//! Analyst feedback models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::VerdictKind;

/// Relevance of a feedback case for future prompts, always within [0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
#[serde(from = "f64", into = "f64")]
#[schema(value_type = f64)]
pub struct RelevanceScore(f64);

impl RelevanceScore {
    pub const MAX: RelevanceScore = RelevanceScore(1.0);

    /// Clamp `value` into [0.0, 1.0]; NaN becomes 0.0
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for RelevanceScore {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<f64> for RelevanceScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<RelevanceScore> for f64 {
    fn from(score: RelevanceScore) -> Self {
        score.0
    }
}

/// One historical analyst correction, as injected into prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackCase {
    pub file_name: String,
    pub file_type: String,
    pub incident_date: String,
    pub original_verdict: VerdictKind,
    pub corrected_verdict: VerdictKind,
    pub analyst_comment: String,
    pub relevance_score: RelevanceScore,
    #[serde(default)]
    pub lesson_learned: Option<String>,
}

/// Stored feedback record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackRecord {
    pub id: i64,
    pub incident_id: String,
    pub analysis_id: Option<i64>,
    pub original_verdict: VerdictKind,
    pub corrected_verdict: VerdictKind,
    pub analyst_comment: String,
    pub relevance_score: RelevanceScore,
    pub lesson_learned: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Feedback ready to be stored
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub incident_id: String,
    pub analysis_id: i64,
    pub original_verdict: VerdictKind,
    pub corrected_verdict: VerdictKind,
    pub analyst_comment: String,
    pub relevance_score: RelevanceScore,
    pub lesson_learned: Option<String>,
}
