use crate::db::DbError;
use crate::service::evidence::EvidenceError;
use crate::service::llm::LlmError;
use crate::service::prompt::PromptError;
use crate::service::verdict::VerdictError;

/// Error type for the triage flow
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TriageError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Model verdict rejected: {0}")]
    Validation(#[from] VerdictError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl From<PromptError> for TriageError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::InvalidInput(message) => TriageError::InvalidInput(message),
        }
    }
}
