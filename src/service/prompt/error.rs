//! Error types for prompt composition

use thiserror::Error;

/// Error type for prompt composition
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PromptError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
