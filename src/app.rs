//! Application state and service initialization
//!
//! Centralizes service construction so handlers only see ready-made services.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::repository::TriageRepository;
use crate::model::Config;
use crate::service::{CompletionBackend, FeedbackService, LlmClient, TriageService};

const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Application state containing all services and shared resources
pub struct AppState {
    /// Database connection pool
    pub db_pool: SqlitePool,
    /// Incident triage service
    pub triage_service: TriageService,
    /// Analyst feedback service
    pub feedback_service: FeedbackService,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Database connection and schema initialization
    /// 2. LLM client initialization (requires GEMINI_API_KEY)
    /// 3. Service construction
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let db_pool = crate::db::create_pool(&config.database_url)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        crate::db::init_schema(&db_pool)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        let api_key = std::env::var(ENV_GEMINI_API_KEY)
            .map_err(|_| AppError::MissingConfig(ENV_GEMINI_API_KEY))?;

        let llm_client = LlmClient::new(&api_key);

        Ok(Self::with_backend(db_pool, Arc::new(llm_client), config))
    }

    /// Build state around an existing pool and completion backend
    pub fn with_backend(
        db_pool: SqlitePool,
        backend: Arc<dyn CompletionBackend>,
        config: &Config,
    ) -> Self {
        let repository = TriageRepository::new(db_pool.clone());

        tracing::info!(
            model = %backend.model(),
            feedback_limit = config.triage.feedback_limit,
            max_evidence_chars = config.triage.max_evidence_chars,
            use_feedback = config.triage.use_feedback,
            evidence_dir = %config.evidence_dir.display(),
            "Triage services initialized"
        );

        Self {
            triage_service: TriageService::new(
                repository.clone(),
                backend,
                &config.triage,
                config.evidence_dir.clone(),
            ),
            feedback_service: FeedbackService::new(repository),
            db_pool,
        }
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test, web};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::db::test_pool;
    use crate::service::llm::LlmError;

    struct FixedBackend(String);

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        fn model(&self) -> &str {
            "fixed-model"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn false_positive_response() -> String {
        json!({
            "verdict": "FALSE_POSITIVE",
            "confidence": 0.85,
            "summary": "Public marketing brochure shared with a partner",
            "reasoning": "The document is the published product brochure available on the company website. It contains no customer data, credentials or internal financial figures.",
            "indicators": ["Published marketing material"],
            "false_positive_reasons": ["Content is already public"]
        })
        .to_string()
    }

    async fn state() -> AppState {
        AppState::with_backend(
            test_pool().await,
            Arc::new(FixedBackend(false_positive_response())),
            &Config::default(),
        )
    }

    #[actix_web::test]
    async fn test_analyze_then_correct_over_http() {
        let state = state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.triage_service.clone()))
                .app_data(web::Data::new(state.feedback_service.clone()))
                .configure(crate::api::incidents::configure)
                .configure(crate::api::feedback::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/v1/incidents/analyze")
            .set_json(json!({
                "incident_id": "INC-42",
                "file_name": "brochure.txt",
                "evidence": "Our product makes teams faster."
            }))
            .to_request();
        let outcome: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome["verdict"]["verdict"], "FALSE_POSITIVE");
        let analysis_id = outcome["analysis_id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri("/v1/feedback")
            .set_json(json!({
                "incident_id": "INC-42",
                "analysis_id": analysis_id,
                "corrected_verdict": "TRUE_POSITIVE",
                "analyst_comment": "Brochure draft contained unreleased pricing",
                "relevance_score": 0.8
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/v1/stats").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["feedback"]["corrections"], 1);
        assert_eq!(stats["database"]["ai_accuracy"], 0.0);

        let req = test::TestRequest::get()
            .uri("/v1/incidents/INC-42/analysis")
            .to_request();
        let analysis: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(analysis["id"], analysis_id);
    }

    #[actix_web::test]
    async fn test_error_statuses_over_http() {
        let state = state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.triage_service.clone()))
                .app_data(web::Data::new(state.feedback_service.clone()))
                .configure(crate::api::incidents::configure)
                .configure(crate::api::feedback::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/v1/incidents/analyze")
            .set_json(json!({"incident_id": "INC-1", "evidence": ""}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/v1/incidents/INC-404").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/v1/incidents?status=closed")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete()
            .uri("/v1/maintenance/retention?days=7")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
