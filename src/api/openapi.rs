//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::{feedback, health, incidents};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DLP Triage API",
        description = "LLM-assisted triage of DLP incidents with analyst feedback"
    ),
    paths(
        incidents::analyze_incident,
        incidents::list_incidents,
        incidents::get_incident,
        incidents::get_latest_analysis,
        feedback::submit_feedback,
        feedback::feedback_history,
        feedback::stats,
        feedback::clear_old_data,
        health::liveness,
        health::readiness,
    ),
    components(schemas(
        crate::api::error::ErrorResponse,
        crate::model::Verdict,
        crate::model::VerdictKind,
        crate::model::RiskLevel,
        crate::model::Incident,
        crate::model::IncidentStatus,
        crate::model::AnalysisRecord,
        crate::model::FeedbackCase,
        crate::model::FeedbackRecord,
        crate::model::FeedbackStats,
        crate::model::DatabaseStats,
        crate::model::RetentionReport,
        crate::service::triage::TriageRequest,
        crate::service::triage::AnalysisOutcome,
        crate::service::triage::TriageStats,
        crate::service::feedback::FeedbackRequest,
    )),
    tags(
        (name = "incidents", description = "Incident triage"),
        (name = "feedback", description = "Analyst feedback and statistics"),
        (name = "maintenance", description = "Data retention"),
        (name = "health", description = "Health probes")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}
