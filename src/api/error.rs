//! Unified API error handling
//!
//! Every endpoint answers errors with the same JSON envelope.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbError;
use crate::service::feedback::FeedbackError;
use crate::service::triage::TriageError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
    /// Individual problems behind the error, when there are several
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Unified API error type
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Model output failed verdict validation (422)
    #[error("Verdict rejected: {message}")]
    VerdictRejected {
        message: String,
        violations: Vec<String>,
    },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),

    /// LLM provider error (502)
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::VerdictRejected { .. } => "verdict_rejected",
            ApiError::Internal(_) => "internal_error",
            ApiError::Database(_) => "database_error",
            ApiError::ExternalService(_) => "external_service_error",
        }
    }

    fn details(&self) -> Vec<String> {
        match self {
            ApiError::VerdictRejected { violations, .. } => violations.clone(),
            _ => Vec::new(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::VerdictRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = self.error_type();
        let request_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                error_type = error_type,
                status = status.as_u16(),
                request_id = %request_id,
                message = %self,
                "API error"
            );
        } else {
            tracing::warn!(
                error_type = error_type,
                status = status.as_u16(),
                request_id = %request_id,
                message = %self,
                "API request rejected"
            );
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id,
            details: self.details(),
        })
    }
}

// ============================================================================
// From conversions for service errors
// ============================================================================

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(id) => ApiError::NotFound(id),
            _ => ApiError::Database(err.to_string()),
        }
    }
}

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::InvalidInput(msg) => ApiError::BadRequest(msg),
            TriageError::Evidence(e) => match e {
                crate::service::evidence::EvidenceError::Io(_) => ApiError::Internal(e.to_string()),
                _ => ApiError::BadRequest(e.to_string()),
            },
            TriageError::Llm(e) => ApiError::ExternalService(e.to_string()),
            TriageError::Validation(e) => ApiError::VerdictRejected {
                message: e.to_string(),
                violations: e.violations().iter().map(ToString::to_string).collect(),
            },
            TriageError::Db(e) => e.into(),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::AnalysisNotFound(id) => ApiError::NotFound(format!("analysis {}", id)),
            FeedbackError::AnalysisMismatch { .. } | FeedbackError::InvalidComment => {
                ApiError::BadRequest(err.to_string())
            }
            FeedbackError::Db(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::llm::LlmError;
    use crate::service::verdict::{VerdictError, Violation};

    #[test]
    fn test_triage_errors_map_to_status_codes() {
        let cases = [
            (
                TriageError::InvalidInput("empty".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                TriageError::Validation(VerdictError::InvalidVerdict("MAYBE".to_string())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                TriageError::Llm(LlmError::Completion("timeout".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TriageError::Db(DbError::NotFound("INC-1".to_string())),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_feedback_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(FeedbackError::AnalysisNotFound(3)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(FeedbackError::InvalidComment).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_envelope() {
        let response = ApiError::BadRequest("missing evidence".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_verdict_violations_are_listed_in_details() {
        let err = ApiError::from(TriageError::Validation(VerdictError::SchemaViolation(vec![
            Violation {
                field: "summary",
                message: "length 250 exceeds maximum of 200 characters".to_string(),
            },
            Violation {
                field: "indicators",
                message: "at least one indicator is required".to_string(),
            },
        ])));

        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope["error"], "verdict_rejected");
        assert_eq!(
            envelope["details"],
            serde_json::json!([
                "summary: length 250 exceeds maximum of 200 characters",
                "indicators: at least one indicator is required"
            ])
        );

        let response = ApiError::NotFound("INC-1".to_string()).error_response();
        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(envelope.get("details").is_none());
    }
}
