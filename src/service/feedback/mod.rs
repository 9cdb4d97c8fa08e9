//! Analyst feedback service

use serde::Deserialize;
use utoipa::ToSchema;

use crate::db::DbError;
use crate::db::repository::TriageRepository;
use crate::model::{
    FeedbackCase, FeedbackRecord, IncidentStatus, NewFeedback, RelevanceScore, VerdictKind,
};

pub mod selection;

/// Shortest accepted analyst comment, after trimming
pub const MIN_COMMENT_CHARS: usize = 10;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(i64),

    #[error("Analysis {analysis_id} does not belong to incident {incident_id}")]
    AnalysisMismatch {
        analysis_id: i64,
        incident_id: String,
    },

    #[error("Analyst comment must be at least {} characters", MIN_COMMENT_CHARS)]
    InvalidComment,

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Analyst correction of a stored analysis
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    pub incident_id: String,
    pub analysis_id: i64,
    pub corrected_verdict: VerdictKind,
    pub analyst_comment: String,
    /// How useful this case is for future analyses (clamped to 0.0..=1.0)
    #[serde(default)]
    #[schema(value_type = f64)]
    pub relevance_score: RelevanceScore,
    #[serde(default)]
    pub lesson_learned: Option<String>,
}

/// Service for storing and retrieving analyst feedback
#[derive(Clone)]
pub struct FeedbackService {
    repository: TriageRepository,
}

impl FeedbackService {
    pub fn new(repository: TriageRepository) -> Self {
        Self { repository }
    }

    /// Store an analyst correction and move the incident to its new status
    pub async fn submit(&self, request: FeedbackRequest) -> Result<FeedbackRecord, FeedbackError> {
        let analyst_comment = request.analyst_comment.trim();
        if analyst_comment.chars().count() < MIN_COMMENT_CHARS {
            return Err(FeedbackError::InvalidComment);
        }

        let analysis = match self.repository.get_analysis(request.analysis_id).await {
            Ok(analysis) => analysis,
            Err(DbError::NotFound(_)) => {
                return Err(FeedbackError::AnalysisNotFound(request.analysis_id));
            }
            Err(e) => return Err(e.into()),
        };

        if analysis.incident_id != request.incident_id {
            return Err(FeedbackError::AnalysisMismatch {
                analysis_id: request.analysis_id,
                incident_id: request.incident_id,
            });
        }

        let lesson_learned = request
            .lesson_learned
            .map(|lesson| lesson.trim().to_string())
            .filter(|lesson| !lesson.is_empty());

        let status = match request.corrected_verdict {
            VerdictKind::RequiresReview => IncidentStatus::Pending,
            _ => IncidentStatus::Analyzed,
        };

        let record = self
            .repository
            .insert_feedback(
                &NewFeedback {
                    incident_id: request.incident_id,
                    analysis_id: analysis.id,
                    original_verdict: analysis.verdict.verdict,
                    corrected_verdict: request.corrected_verdict,
                    analyst_comment: analyst_comment.to_string(),
                    relevance_score: request.relevance_score,
                    lesson_learned,
                },
                status,
            )
            .await?;

        tracing::info!(
            feedback_id = record.id,
            incident_id = %record.incident_id,
            correction = record.original_verdict != record.corrected_verdict,
            status = %status,
            "Analyst feedback recorded"
        );

        Ok(record)
    }

    /// Ranked feedback history, as used for prompt injection
    pub async fn history(&self, limit: usize) -> Result<Vec<FeedbackCase>, FeedbackError> {
        Ok(self.repository.feedback_for_rag(limit).await?)
    }
}
