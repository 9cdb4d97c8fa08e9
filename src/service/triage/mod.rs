//! Incident triage service
//!
//! Ties evidence loading, feedback retrieval, prompt composition, the model
//! call and verdict validation together, and records the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::db::repository::TriageRepository;
use crate::model::{
    AnalysisRecord, DatabaseStats, FeedbackStats, Incident, IncidentMetadata, IncidentStatus,
    NewAnalysis, NewIncident, RetentionReport, TriageConfig, Verdict,
};
use crate::service::evidence::{LoadedEvidence, load_evidence};
use crate::service::llm::CompletionBackend;
use crate::service::prompt::PromptComposer;
use crate::service::verdict::validate_verdict;

pub mod error;

pub use error::TriageError;

/// Incident submitted for analysis
///
/// Exactly one of `evidence` (inline text) and `evidence_file` (a file in the
/// evidence directory) must be set.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TriageRequest {
    pub incident_id: String,
    /// Raw incident record from the DLP vendor
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    /// Display name for inline evidence
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub evidence_file: Option<String>,
    /// Overrides the configured feedback setting
    #[serde(default)]
    pub use_feedback: Option<bool>,
}

/// Result of a successful analysis
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalysisOutcome {
    pub incident_id: String,
    pub analysis_id: i64,
    pub model: String,
    pub verdict: Verdict,
    pub processing_time_secs: f64,
    /// Number of feedback cases available to the prompt
    pub feedback_cases: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TriageStats {
    pub database: DatabaseStats,
    pub feedback: FeedbackStats,
}

/// Service running the triage flow
#[derive(Clone)]
pub struct TriageService {
    repository: TriageRepository,
    backend: Arc<dyn CompletionBackend>,
    composer: PromptComposer,
    evidence_dir: PathBuf,
    use_feedback: bool,
}

impl TriageService {
    pub fn new(
        repository: TriageRepository,
        backend: Arc<dyn CompletionBackend>,
        config: &TriageConfig,
        evidence_dir: PathBuf,
    ) -> Self {
        Self {
            repository,
            backend,
            composer: PromptComposer::from_config(config),
            evidence_dir,
            use_feedback: config.use_feedback,
        }
    }

    /// Analyze one incident and store the verdict
    pub async fn analyze(&self, request: TriageRequest) -> Result<AnalysisOutcome, TriageError> {
        let start_time = Instant::now();

        let incident_id = request.incident_id.trim().to_string();
        if incident_id.is_empty() {
            return Err(TriageError::InvalidInput(
                "incident_id must not be empty".to_string(),
            ));
        }

        let loaded = self.resolve_evidence(&request).await?;
        let metadata = request
            .metadata
            .as_ref()
            .map(IncidentMetadata::from_vendor_json);

        let feedback = if request.use_feedback.unwrap_or(self.use_feedback) {
            self.repository
                .feedback_for_rag(self.composer.feedback_limit())
                .await?
        } else {
            Vec::new()
        };

        // Rejected input never reaches the store
        let prompt = self
            .composer
            .compose(&feedback, metadata.as_ref(), &loaded.evidence)?;

        let registered = self
            .repository
            .insert_incident(&NewIncident {
                id: incident_id.clone(),
                file_name: loaded.evidence.file_name.clone(),
                file_type: loaded.file_type.clone(),
                file_size: Some(loaded.file_size),
                content_hash: Some(loaded.content_hash.clone()),
                user_email: request.metadata.as_ref().and_then(user_email),
                vendor_data: request.metadata.clone(),
            })
            .await?;

        tracing::info!(
            incident_id = %incident_id,
            new_incident = registered,
            feedback_cases = feedback.len(),
            prompt_length = prompt.len(),
            "Starting incident analysis"
        );

        let raw_response = match self.backend.complete(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                self.mark_error(&incident_id).await;
                return Err(e.into());
            }
        };

        let verdict = match validate_verdict(&raw_response) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(
                    incident_id = %incident_id,
                    error = %e,
                    raw_response = %raw_response,
                    "Model verdict rejected"
                );
                self.mark_error(&incident_id).await;
                return Err(e.into());
            }
        };

        let processing_time_secs = start_time.elapsed().as_secs_f64();
        let analysis_id = self
            .repository
            .insert_analysis(&NewAnalysis {
                incident_id: incident_id.clone(),
                model: self.backend.model().to_string(),
                verdict: verdict.clone(),
                raw_response,
                processing_time_secs,
            })
            .await?;

        self.repository
            .update_incident_status(&incident_id, IncidentStatus::Analyzed)
            .await?;

        tracing::info!(
            incident_id = %incident_id,
            analysis_id = analysis_id,
            verdict = %verdict.verdict,
            confidence = verdict.confidence,
            elapsed_ms = start_time.elapsed().as_millis(),
            "Incident analysis completed"
        );

        Ok(AnalysisOutcome {
            incident_id,
            analysis_id,
            model: self.backend.model().to_string(),
            verdict,
            processing_time_secs,
            feedback_cases: feedback.len(),
        })
    }

    async fn resolve_evidence(&self, request: &TriageRequest) -> Result<LoadedEvidence, TriageError> {
        match (&request.evidence, &request.evidence_file) {
            (Some(text), None) => Ok(LoadedEvidence::inline(
                request.file_name.clone(),
                text.clone(),
            )),
            (None, Some(file_name)) => Ok(load_evidence(&self.evidence_dir, file_name).await?),
            (Some(_), Some(_)) => Err(TriageError::InvalidInput(
                "provide either evidence or evidence_file, not both".to_string(),
            )),
            (None, None) => Err(TriageError::InvalidInput(
                "one of evidence or evidence_file is required".to_string(),
            )),
        }
    }

    async fn mark_error(&self, incident_id: &str) {
        if let Err(e) = self
            .repository
            .update_incident_status(incident_id, IncidentStatus::Error)
            .await
        {
            tracing::warn!(incident_id = %incident_id, error = %e, "Failed to mark incident as failed");
        }
    }

    pub async fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>, TriageError> {
        Ok(self.repository.list_incidents(status).await?)
    }

    pub async fn get_incident(&self, id: &str) -> Result<Incident, TriageError> {
        Ok(self.repository.get_incident(id).await?)
    }

    /// Most recent analysis of an incident
    pub async fn latest_analysis(&self, incident_id: &str) -> Result<AnalysisRecord, TriageError> {
        Ok(self.repository.latest_analysis(incident_id).await?)
    }

    pub async fn stats(&self) -> Result<TriageStats, TriageError> {
        Ok(TriageStats {
            database: self.repository.database_stats().await?,
            feedback: self.repository.feedback_stats().await?,
        })
    }

    /// Remove triage data older than `days`
    pub async fn clear_old_data(&self, days: u32) -> Result<RetentionReport, TriageError> {
        Ok(self.repository.clear_old_data(days).await?)
    }
}

fn user_email(record: &Value) -> Option<String> {
    record
        .pointer("/user/email")
        .and_then(Value::as_str)
        .map(str::to_string)
}
