//! REST API endpoints for analyst feedback, statistics and maintenance

use actix_web::{HttpResponse, delete, get, post, web};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::error::ApiError;
use crate::service::feedback::FeedbackRequest;
use crate::service::{FeedbackService, TriageService};

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 200;
const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Deserialize, IntoParams)]
pub struct FeedbackHistoryParams {
    /// Number of cases to return (default: 20, max: 200)
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RetentionParams {
    /// Delete data older than this many days (default: 30)
    pub days: Option<u32>,
}

/// Submit an analyst correction for an analysis
#[utoipa::path(
    post,
    path = "/v1/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 201, description = "Feedback recorded", body = crate::model::FeedbackRecord),
        (status = 400, description = "Invalid feedback", body = crate::api::error::ErrorResponse),
        (status = 404, description = "Analysis not found", body = crate::api::error::ErrorResponse)
    ),
    tag = "feedback"
)]
#[post("/v1/feedback")]
pub async fn submit_feedback(
    service: web::Data<FeedbackService>,
    request: web::Json<FeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    let record = service.submit(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(record))
}

/// Ranked feedback history, most relevant first
#[utoipa::path(
    get,
    path = "/v1/feedback",
    params(FeedbackHistoryParams),
    responses(
        (status = 200, description = "Feedback retrieved", body = Vec<crate::model::FeedbackCase>)
    ),
    tag = "feedback"
)]
#[get("/v1/feedback")]
pub async fn feedback_history(
    service: web::Data<FeedbackService>,
    query: web::Query<FeedbackHistoryParams>,
) -> Result<HttpResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let cases = service.history(limit).await?;
    Ok(HttpResponse::Ok().json(cases))
}

/// Store-wide and feedback statistics
#[utoipa::path(
    get,
    path = "/v1/stats",
    responses(
        (status = 200, description = "Statistics", body = crate::service::triage::TriageStats)
    ),
    tag = "feedback"
)]
#[get("/v1/stats")]
pub async fn stats(service: web::Data<TriageService>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(service.stats().await?))
}

/// Delete triage data older than the retention period
#[utoipa::path(
    delete,
    path = "/v1/maintenance/retention",
    params(RetentionParams),
    responses(
        (status = 200, description = "Old data removed", body = crate::model::RetentionReport)
    ),
    tag = "maintenance"
)]
#[delete("/v1/maintenance/retention")]
pub async fn clear_old_data(
    service: web::Data<TriageService>,
    query: web::Query<RetentionParams>,
) -> Result<HttpResponse, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_RETENTION_DAYS);
    let report = service.clear_old_data(days).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Configure feedback, statistics and maintenance routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(submit_feedback)
        .service(feedback_history)
        .service(stats)
        .service(clear_old_data);
}
