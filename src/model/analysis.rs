//! Stored analyses and aggregate statistics

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Verdict;

/// Stored analysis of one incident
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRecord {
    pub id: i64,
    pub incident_id: String,
    pub model: String,
    pub verdict: Verdict,
    /// Raw model output the verdict was validated from
    pub raw_response: String,
    pub processing_time_secs: f64,
    pub created_at: DateTime<Utc>,
}

/// Analysis ready to be stored
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub incident_id: String,
    pub model: String,
    pub verdict: Verdict,
    pub raw_response: String,
    pub processing_time_secs: f64,
}

/// Feedback counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackStats {
    pub total_feedback: i64,
    /// Feedback where the analyst changed the verdict
    pub corrections: i64,
}

/// Store-wide counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DatabaseStats {
    pub incidents_by_status: BTreeMap<String, i64>,
    pub total_analyses: i64,
    pub total_feedback: i64,
    /// Share of feedback agreeing with the model, in percent
    pub ai_accuracy: f64,
    pub avg_relevance: f64,
}

/// Rows removed by a retention cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RetentionReport {
    pub incidents: u64,
    pub analyses: u64,
    pub feedback: u64,
}
