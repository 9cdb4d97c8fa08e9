//! REST API endpoints for incident triage

use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::error::ApiError;
use crate::model::IncidentStatus;
use crate::service::TriageService;
use crate::service::triage::TriageRequest;

/// Query parameters for listing incidents
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListIncidentsParams {
    /// Filter by status (pending, analyzed, error)
    pub status: Option<String>,
}

/// Analyze an incident and return the validated verdict
#[utoipa::path(
    post,
    path = "/v1/incidents/analyze",
    request_body = TriageRequest,
    responses(
        (status = 200, description = "Incident analyzed", body = crate::service::triage::AnalysisOutcome),
        (status = 400, description = "Invalid evidence or request", body = crate::api::error::ErrorResponse),
        (status = 422, description = "Model verdict rejected", body = crate::api::error::ErrorResponse),
        (status = 502, description = "LLM provider failure", body = crate::api::error::ErrorResponse)
    ),
    tag = "incidents"
)]
#[post("/v1/incidents/analyze")]
pub async fn analyze_incident(
    service: web::Data<TriageService>,
    request: web::Json<TriageRequest>,
) -> Result<HttpResponse, ApiError> {
    let outcome = service.analyze(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// List incidents, newest first
#[utoipa::path(
    get,
    path = "/v1/incidents",
    params(ListIncidentsParams),
    responses(
        (status = 200, description = "Incidents retrieved", body = Vec<crate::model::Incident>),
        (status = 400, description = "Unknown status", body = crate::api::error::ErrorResponse)
    ),
    tag = "incidents"
)]
#[get("/v1/incidents")]
pub async fn list_incidents(
    service: web::Data<TriageService>,
    query: web::Query<ListIncidentsParams>,
) -> Result<HttpResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<IncidentStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let incidents = service.list_incidents(status).await?;
    Ok(HttpResponse::Ok().json(incidents))
}

/// Get an incident by ID
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}",
    params(
        ("id" = String, Path, description = "Incident ID")
    ),
    responses(
        (status = 200, description = "Incident retrieved", body = crate::model::Incident),
        (status = 404, description = "Incident not found", body = crate::api::error::ErrorResponse)
    ),
    tag = "incidents"
)]
#[get("/v1/incidents/{id}")]
pub async fn get_incident(
    service: web::Data<TriageService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let incident = service.get_incident(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(incident))
}

/// Get the most recent analysis of an incident
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}/analysis",
    params(
        ("id" = String, Path, description = "Incident ID")
    ),
    responses(
        (status = 200, description = "Analysis retrieved", body = crate::model::AnalysisRecord),
        (status = 404, description = "No analysis for this incident", body = crate::api::error::ErrorResponse)
    ),
    tag = "incidents"
)]
#[get("/v1/incidents/{id}/analysis")]
pub async fn get_latest_analysis(
    service: web::Data<TriageService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let analysis = service.latest_analysis(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(analysis))
}

/// Configure incident routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze_incident)
        .service(list_incidents)
        .service(get_latest_analysis)
        .service(get_incident);
}
