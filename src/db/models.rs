//! Database models for incidents, analyses and feedback

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::FromRow;

use crate::model::{
    AnalysisRecord, FeedbackCase, FeedbackRecord, Incident, RelevanceScore, Verdict, VerdictKind,
};

/// Format of SQLite `CURRENT_TIMESTAMP`
pub const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a SQLite timestamp (UTC)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(raw, SQLITE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("Invalid timestamp '{}': {}", raw, e))
}

fn parse_verdict(raw: &str) -> Result<VerdictKind, String> {
    raw.parse()
        .map_err(|e| format!("Invalid stored verdict: {}", e))
}

/// Database representation of an incident
#[derive(Debug, Clone, FromRow)]
pub struct IncidentRow {
    pub incident_id: String,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub content_hash: Option<String>,
    pub user_email: Option<String>,
    pub vendor_data: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl IncidentRow {
    /// Convert database row to domain model
    pub fn into_domain(self) -> Result<Incident, String> {
        let status = self
            .status
            .parse()
            .map_err(|e| format!("Invalid incident status: {}", e))?;

        // Unparseable vendor data is dropped rather than failing the whole row
        let vendor_data = self
            .vendor_data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Ok(Incident {
            id: self.incident_id,
            file_name: self.file_name,
            file_type: self.file_type,
            file_size: self.file_size,
            content_hash: self.content_hash,
            user_email: self.user_email,
            vendor_data,
            status,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Database representation of an analysis
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisRow {
    pub id: i64,
    pub incident_id: String,
    pub model: String,
    pub verdict_json: String,
    pub raw_response: String,
    pub processing_time: f64,
    pub created_at: String,
}

impl AnalysisRow {
    pub fn into_domain(self) -> Result<AnalysisRecord, String> {
        let verdict: Verdict = serde_json::from_str(&self.verdict_json)
            .map_err(|e| format!("Invalid stored verdict JSON: {}", e))?;

        Ok(AnalysisRecord {
            id: self.id,
            incident_id: self.incident_id,
            model: self.model,
            verdict,
            raw_response: self.raw_response,
            processing_time_secs: self.processing_time,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Database representation of a feedback record
#[derive(Debug, Clone, FromRow)]
pub struct FeedbackRow {
    pub id: i64,
    pub incident_id: String,
    pub analysis_id: Option<i64>,
    pub original_verdict: String,
    pub corrected_verdict: String,
    pub analyst_comment: String,
    pub relevance_score: f64,
    pub lesson_learned: Option<String>,
    pub created_at: String,
}

impl FeedbackRow {
    pub fn into_domain(self) -> Result<FeedbackRecord, String> {
        Ok(FeedbackRecord {
            id: self.id,
            incident_id: self.incident_id,
            analysis_id: self.analysis_id,
            original_verdict: parse_verdict(&self.original_verdict)?,
            corrected_verdict: parse_verdict(&self.corrected_verdict)?,
            analyst_comment: self.analyst_comment,
            relevance_score: RelevanceScore::new(self.relevance_score),
            lesson_learned: self.lesson_learned,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Feedback joined with its incident, as used for prompt injection
#[derive(Debug, Clone, FromRow)]
pub struct FeedbackCaseRow {
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub incident_date: String,
    pub original_verdict: String,
    pub corrected_verdict: String,
    pub analyst_comment: String,
    pub relevance_score: f64,
    pub lesson_learned: Option<String>,
}

impl FeedbackCaseRow {
    pub fn into_domain(self) -> Result<FeedbackCase, String> {
        Ok(FeedbackCase {
            file_name: self.file_name.unwrap_or_else(|| "unknown".to_string()),
            file_type: self.file_type.unwrap_or_else(|| "unknown".to_string()),
            incident_date: self.incident_date,
            original_verdict: parse_verdict(&self.original_verdict)?,
            corrected_verdict: parse_verdict(&self.corrected_verdict)?,
            analyst_comment: self.analyst_comment,
            relevance_score: RelevanceScore::new(self.relevance_score),
            lesson_learned: self.lesson_learned,
        })
    }
}
