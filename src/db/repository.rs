//! Repository for incident, analysis and feedback database operations

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use super::DbError;
use super::models::{
    AnalysisRow, FeedbackCaseRow, FeedbackRow, IncidentRow, SQLITE_TIMESTAMP_FORMAT,
};
use crate::model::{
    AnalysisRecord, DatabaseStats, FeedbackCase, FeedbackRecord, FeedbackStats, Incident,
    IncidentStatus, NewAnalysis, NewFeedback, NewIncident, RetentionReport,
};

const ANALYSIS_COLUMNS: &str =
    "id, incident_id, model, verdict_json, raw_response, processing_time, created_at";

/// Repository for triage data
#[derive(Clone)]
pub struct TriageRepository {
    pool: SqlitePool,
}

impl TriageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register an incident
    /// Returns false if an incident with the same ID already exists
    pub async fn insert_incident(&self, incident: &NewIncident) -> Result<bool, DbError> {
        let vendor_data = incident
            .vendor_data
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO incidents (
                incident_id, file_name, file_type, file_size,
                content_hash, user_email, vendor_data, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (incident_id) DO NOTHING
            "#,
        )
        .bind(&incident.id)
        .bind(&incident.file_name)
        .bind(&incident.file_type)
        .bind(incident.file_size)
        .bind(&incident.content_hash)
        .bind(&incident.user_email)
        .bind(&vendor_data)
        .bind(IncidentStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::debug!(incident_id = %incident.id, "Registered incident");
        } else {
            tracing::debug!(incident_id = %incident.id, "Incident already registered");
        }

        Ok(inserted)
    }

    /// Get an incident by ID
    pub async fn get_incident(&self, id: &str) -> Result<Incident, DbError> {
        let row: IncidentRow = sqlx::query_as("SELECT * FROM incidents WHERE incident_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;

        row.into_domain().map_err(DbError::Serialization)
    }

    /// List incidents, newest first
    pub async fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>, DbError> {
        let rows: Vec<IncidentRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM incidents WHERE status = ? ORDER BY created_at DESC, rowid DESC",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM incidents ORDER BY created_at DESC, rowid DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_domain() {
                Ok(incident) => Some(incident),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable incident row");
                    None
                }
            })
            .collect())
    }

    /// Update an incident's status
    pub async fn update_incident_status(
        &self,
        id: &str,
        status: IncidentStatus,
    ) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE incidents SET status = ? WHERE incident_id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(id.to_string()));
        }

        tracing::debug!(incident_id = %id, status = %status, "Updated incident status");
        Ok(())
    }

    /// Store an analysis and return its ID
    pub async fn insert_analysis(&self, analysis: &NewAnalysis) -> Result<i64, DbError> {
        let verdict_json = serde_json::to_string(&analysis.verdict)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO analysis (
                incident_id, model, verdict, confidence, summary, reasoning,
                risk_level, verdict_json, raw_response, processing_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&analysis.incident_id)
        .bind(&analysis.model)
        .bind(analysis.verdict.verdict.as_str())
        .bind(analysis.verdict.confidence)
        .bind(&analysis.verdict.summary)
        .bind(&analysis.verdict.reasoning)
        .bind(analysis.verdict.risk_level.map(|r| r.as_str()))
        .bind(&verdict_json)
        .bind(&analysis.raw_response)
        .bind(analysis.processing_time_secs)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!(
            analysis_id = id,
            incident_id = %analysis.incident_id,
            verdict = %analysis.verdict.verdict,
            "Stored analysis"
        );

        Ok(id)
    }

    /// Get an analysis by ID
    pub async fn get_analysis(&self, id: i64) -> Result<AnalysisRecord, DbError> {
        let row: AnalysisRow =
            sqlx::query_as(&format!("SELECT {ANALYSIS_COLUMNS} FROM analysis WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("analysis {}", id)))?;

        row.into_domain().map_err(DbError::Serialization)
    }

    /// Most recent analysis of an incident
    pub async fn latest_analysis(&self, incident_id: &str) -> Result<AnalysisRecord, DbError> {
        let row: AnalysisRow = sqlx::query_as(&format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analysis WHERE incident_id = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(incident_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("analysis for incident {}", incident_id)))?;

        row.into_domain().map_err(DbError::Serialization)
    }

    /// Store analyst feedback and move its incident to `status`
    ///
    /// Both writes happen in one transaction.
    pub async fn insert_feedback(
        &self,
        feedback: &NewFeedback,
        status: IncidentStatus,
    ) -> Result<FeedbackRecord, DbError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO feedback (
                incident_id, analysis_id, original_verdict, corrected_verdict,
                analyst_comment, relevance_score, lesson_learned
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&feedback.incident_id)
        .bind(feedback.analysis_id)
        .bind(feedback.original_verdict.as_str())
        .bind(feedback.corrected_verdict.as_str())
        .bind(&feedback.analyst_comment)
        .bind(feedback.relevance_score.value())
        .bind(&feedback.lesson_learned)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();

        let updated = sqlx::query("UPDATE incidents SET status = ? WHERE incident_id = ?")
            .bind(status.as_str())
            .bind(&feedback.incident_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(DbError::NotFound(feedback.incident_id.clone()));
        }

        let row: FeedbackRow = sqlx::query_as("SELECT * FROM feedback WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            feedback_id = id,
            incident_id = %feedback.incident_id,
            original = %feedback.original_verdict,
            corrected = %feedback.corrected_verdict,
            status = %status,
            "Stored feedback"
        );

        row.into_domain().map_err(DbError::Serialization)
    }

    /// Most relevant feedback, joined with incident details
    ///
    /// Equal relevance is broken by the most recent incident.
    pub async fn feedback_for_rag(&self, limit: usize) -> Result<Vec<FeedbackCase>, DbError> {
        let rows: Vec<FeedbackCaseRow> = sqlx::query_as(
            r#"
            SELECT i.file_name, i.file_type, i.created_at AS incident_date,
                   f.original_verdict, f.corrected_verdict, f.analyst_comment,
                   f.relevance_score, f.lesson_learned
            FROM feedback f
            JOIN incidents i ON f.incident_id = i.incident_id
            ORDER BY f.relevance_score DESC, i.created_at DESC, f.id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_domain() {
                Ok(case) => Some(case),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable feedback row");
                    None
                }
            })
            .collect())
    }

    pub async fn feedback_stats(&self) -> Result<FeedbackStats, DbError> {
        let total_feedback: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(&self.pool)
            .await?;

        let corrections: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM feedback WHERE original_verdict != corrected_verdict",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(FeedbackStats {
            total_feedback,
            corrections,
        })
    }

    pub async fn database_stats(&self) -> Result<DatabaseStats, DbError> {
        let by_status: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM incidents GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let total_analyses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis")
            .fetch_one(&self.pool)
            .await?;

        let feedback = self.feedback_stats().await?;
        let agreeing = feedback.total_feedback - feedback.corrections;
        let ai_accuracy = if feedback.total_feedback > 0 {
            agreeing as f64 / feedback.total_feedback as f64 * 100.0
        } else {
            0.0
        };

        let avg_relevance: Option<f64> =
            sqlx::query_scalar("SELECT AVG(relevance_score) FROM feedback")
                .fetch_one(&self.pool)
                .await?;

        Ok(DatabaseStats {
            incidents_by_status: by_status.into_iter().collect::<BTreeMap<_, _>>(),
            total_analyses,
            total_feedback: feedback.total_feedback,
            ai_accuracy,
            avg_relevance: avg_relevance.unwrap_or(0.0),
        })
    }

    /// Delete data older than `days`
    ///
    /// Rows still referenced by newer rows are kept.
    pub async fn clear_old_data(&self, days: u32) -> Result<RetentionReport, DbError> {
        let cutoff = (Utc::now() - Duration::days(i64::from(days)))
            .format(SQLITE_TIMESTAMP_FORMAT)
            .to_string();

        let mut tx = self.pool.begin().await?;

        let feedback = sqlx::query("DELETE FROM feedback WHERE created_at < ?")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let analyses = sqlx::query(
            r#"
            DELETE FROM analysis
            WHERE created_at < ?
              AND id NOT IN (SELECT analysis_id FROM feedback WHERE analysis_id IS NOT NULL)
            "#,
        )
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let incidents = sqlx::query(
            r#"
            DELETE FROM incidents
            WHERE created_at < ?
              AND incident_id NOT IN (SELECT incident_id FROM analysis)
              AND incident_id NOT IN (SELECT incident_id FROM feedback)
            "#,
        )
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::info!(
            days = days,
            incidents = incidents,
            analyses = analyses,
            feedback = feedback,
            "Cleared old triage data"
        );

        Ok(RetentionReport {
            incidents,
            analyses,
            feedback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::model::{RelevanceScore, RiskLevel, Verdict, VerdictKind};

    fn incident(id: &str, file_name: &str) -> NewIncident {
        NewIncident {
            id: id.to_string(),
            file_name: Some(file_name.to_string()),
            file_type: Some("csv".to_string()),
            file_size: Some(128),
            content_hash: Some("abc123".to_string()),
            user_email: Some("jdoe@example.com".to_string()),
            vendor_data: Some(serde_json::json!({"policy": {"name": "PII"}})),
        }
    }

    fn analysis(incident_id: &str, verdict: VerdictKind) -> NewAnalysis {
        NewAnalysis {
            incident_id: incident_id.to_string(),
            model: "gemini-2.5-pro".to_string(),
            verdict: Verdict {
                verdict,
                confidence: 0.8,
                summary: "Customer export".to_string(),
                reasoning: "r".repeat(120),
                risk_level: Some(RiskLevel::Medium),
                indicators: vec!["Email column".to_string()],
                recommendations: vec![],
                false_positive_reasons: vec![],
            },
            raw_response: "{}".to_string(),
            processing_time_secs: 2.5,
        }
    }

    fn feedback(
        incident_id: &str,
        analysis_id: i64,
        corrected: VerdictKind,
        relevance: f64,
    ) -> NewFeedback {
        NewFeedback {
            incident_id: incident_id.to_string(),
            analysis_id,
            original_verdict: VerdictKind::TruePositive,
            corrected_verdict: corrected,
            analyst_comment: "Reviewed with the data owner".to_string(),
            relevance_score: RelevanceScore::new(relevance),
            lesson_learned: None,
        }
    }

    async fn age_rows(repo: &TriageRepository, table: &str, days: i64) {
        let past = (Utc::now() - Duration::days(days))
            .format(SQLITE_TIMESTAMP_FORMAT)
            .to_string();
        sqlx::query(&format!("UPDATE {table} SET created_at = ?"))
            .bind(past)
            .execute(&repo.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_incident_round_trip_and_duplicates() {
        let repo = TriageRepository::new(test_pool().await);

        assert!(repo.insert_incident(&incident("INC-1", "a.csv")).await.unwrap());
        assert!(!repo.insert_incident(&incident("INC-1", "b.csv")).await.unwrap());

        let stored = repo.get_incident("INC-1").await.unwrap();
        assert_eq!(stored.file_name.as_deref(), Some("a.csv"));
        assert_eq!(stored.status, IncidentStatus::Pending);
        assert_eq!(
            stored.vendor_data.unwrap()["policy"]["name"],
            serde_json::json!("PII")
        );

        assert!(matches!(
            repo.get_incident("INC-404").await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_incidents_by_status() {
        let repo = TriageRepository::new(test_pool().await);
        repo.insert_incident(&incident("INC-1", "a.csv")).await.unwrap();
        repo.insert_incident(&incident("INC-2", "b.csv")).await.unwrap();
        repo.update_incident_status("INC-2", IncidentStatus::Analyzed)
            .await
            .unwrap();

        let all = repo.list_incidents(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "INC-2");

        let analyzed = repo
            .list_incidents(Some(IncidentStatus::Analyzed))
            .await
            .unwrap();
        assert_eq!(analyzed.len(), 1);
        assert_eq!(analyzed[0].id, "INC-2");

        assert!(matches!(
            repo.update_incident_status("INC-404", IncidentStatus::Error)
                .await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_analysis_round_trip() {
        let repo = TriageRepository::new(test_pool().await);
        repo.insert_incident(&incident("INC-1", "a.csv")).await.unwrap();

        let first = repo
            .insert_analysis(&analysis("INC-1", VerdictKind::TruePositive))
            .await
            .unwrap();
        let second = repo
            .insert_analysis(&analysis("INC-1", VerdictKind::RequiresReview))
            .await
            .unwrap();
        assert!(second > first);

        let latest = repo.latest_analysis("INC-1").await.unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.verdict.verdict, VerdictKind::RequiresReview);
        assert_eq!(latest.verdict.risk_level, Some(RiskLevel::Medium));

        let by_id = repo.get_analysis(first).await.unwrap();
        assert_eq!(by_id.verdict.verdict, VerdictKind::TruePositive);
        assert!(matches!(
            repo.latest_analysis("INC-404").await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_feedback_for_rag_is_ranked_and_limited() {
        let repo = TriageRepository::new(test_pool().await);
        for (id, name) in [("INC-1", "low.csv"), ("INC-2", "high.csv"), ("INC-3", "mid.csv")] {
            repo.insert_incident(&incident(id, name)).await.unwrap();
        }
        let a1 = repo
            .insert_analysis(&analysis("INC-1", VerdictKind::TruePositive))
            .await
            .unwrap();
        let a2 = repo
            .insert_analysis(&analysis("INC-2", VerdictKind::TruePositive))
            .await
            .unwrap();
        let a3 = repo
            .insert_analysis(&analysis("INC-3", VerdictKind::TruePositive))
            .await
            .unwrap();

        repo.insert_feedback(&feedback("INC-1", a1, VerdictKind::FalsePositive, 0.3), IncidentStatus::Analyzed)
            .await
            .unwrap();
        let stored = repo
            .insert_feedback(&feedback("INC-2", a2, VerdictKind::FalsePositive, 1.0), IncidentStatus::Analyzed)
            .await
            .unwrap();
        repo.insert_feedback(&feedback("INC-3", a3, VerdictKind::TruePositive, 0.7), IncidentStatus::Analyzed)
            .await
            .unwrap();
        assert_eq!(stored.analysis_id, Some(a2));

        let cases = repo.feedback_for_rag(2).await.unwrap();
        let names: Vec<_> = cases.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names, ["high.csv", "mid.csv"]);
        assert_eq!(cases[0].file_type, "csv");
    }

    #[tokio::test]
    async fn test_feedback_ties_prefer_most_recent_incident() {
        let repo = TriageRepository::new(test_pool().await);
        repo.insert_incident(&incident("INC-OLD", "old_incident.csv")).await.unwrap();
        repo.insert_incident(&incident("INC-NEW", "new_incident.csv")).await.unwrap();
        for (id, date) in [("INC-OLD", "2024-01-01 00:00:00"), ("INC-NEW", "2024-06-01 00:00:00")] {
            sqlx::query("UPDATE incidents SET created_at = ? WHERE incident_id = ?")
                .bind(date)
                .bind(id)
                .execute(&repo.pool)
                .await
                .unwrap();
        }
        let a_old = repo
            .insert_analysis(&analysis("INC-OLD", VerdictKind::TruePositive))
            .await
            .unwrap();
        let a_new = repo
            .insert_analysis(&analysis("INC-NEW", VerdictKind::TruePositive))
            .await
            .unwrap();

        // Feedback for the newer incident is written first
        repo.insert_feedback(
            &feedback("INC-NEW", a_new, VerdictKind::FalsePositive, 1.0),
            IncidentStatus::Analyzed,
        )
        .await
        .unwrap();
        repo.insert_feedback(
            &feedback("INC-OLD", a_old, VerdictKind::FalsePositive, 1.0),
            IncidentStatus::Analyzed,
        )
        .await
        .unwrap();

        let cases = repo.feedback_for_rag(1).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].file_name, "new_incident.csv");
        assert_eq!(cases[0].incident_date, "2024-06-01 00:00:00");
    }

    #[tokio::test]
    async fn test_feedback_is_rolled_back_when_status_update_fails() {
        let repo = TriageRepository::new(test_pool().await);
        repo.insert_incident(&incident("INC-1", "a.csv")).await.unwrap();
        let a1 = repo
            .insert_analysis(&analysis("INC-1", VerdictKind::TruePositive))
            .await
            .unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_status BEFORE UPDATE OF status ON incidents BEGIN SELECT RAISE(ABORT, 'status locked'); END",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let result = repo
            .insert_feedback(
                &feedback("INC-1", a1, VerdictKind::FalsePositive, 1.0),
                IncidentStatus::Analyzed,
            )
            .await;

        assert!(matches!(result, Err(DbError::Connection(_))));
        assert_eq!(repo.feedback_stats().await.unwrap().total_feedback, 0);
        assert_eq!(
            repo.get_incident("INC-1").await.unwrap().status,
            IncidentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let repo = TriageRepository::new(test_pool().await);
        repo.insert_incident(&incident("INC-1", "a.csv")).await.unwrap();
        repo.insert_incident(&incident("INC-2", "b.csv")).await.unwrap();
        repo.update_incident_status("INC-1", IncidentStatus::Analyzed)
            .await
            .unwrap();
        let a1 = repo
            .insert_analysis(&analysis("INC-1", VerdictKind::TruePositive))
            .await
            .unwrap();

        let empty = repo.database_stats().await.unwrap();
        assert_eq!(empty.ai_accuracy, 0.0);
        assert_eq!(empty.avg_relevance, 0.0);

        repo.insert_feedback(&feedback("INC-1", a1, VerdictKind::FalsePositive, 1.0), IncidentStatus::Analyzed)
            .await
            .unwrap();
        repo.insert_feedback(&feedback("INC-1", a1, VerdictKind::TruePositive, 0.5), IncidentStatus::Analyzed)
            .await
            .unwrap();

        let stats = repo.database_stats().await.unwrap();
        assert_eq!(stats.incidents_by_status.get("analyzed"), Some(&1));
        assert_eq!(stats.incidents_by_status.get("pending"), Some(&1));
        assert_eq!(stats.total_analyses, 1);
        assert_eq!(stats.total_feedback, 2);
        assert_eq!(stats.ai_accuracy, 50.0);
        assert_eq!(stats.avg_relevance, 0.75);

        let feedback_stats = repo.feedback_stats().await.unwrap();
        assert_eq!(feedback_stats.corrections, 1);
    }

    #[tokio::test]
    async fn test_clear_old_data_keeps_referenced_rows() {
        let repo = TriageRepository::new(test_pool().await);
        repo.insert_incident(&incident("INC-OLD", "old.csv")).await.unwrap();
        repo.insert_incident(&incident("INC-REF", "ref.csv")).await.unwrap();
        repo.insert_analysis(&analysis("INC-REF", VerdictKind::TruePositive))
            .await
            .unwrap();
        age_rows(&repo, "incidents", 45).await;

        // A fresh analysis still references INC-REF
        let report = repo.clear_old_data(30).await.unwrap();
        assert_eq!(
            report,
            RetentionReport {
                incidents: 1,
                analyses: 0,
                feedback: 0
            }
        );
        assert!(repo.get_incident("INC-REF").await.is_ok());

        age_rows(&repo, "analysis", 45).await;
        let report = repo.clear_old_data(30).await.unwrap();
        assert_eq!(report.analyses, 1);
        assert_eq!(report.incidents, 1);
        assert!(repo.list_incidents(None).await.unwrap().is_empty());
    }
}
