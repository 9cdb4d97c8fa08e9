//! Error types for verdict validation

use std::fmt;

use thiserror::Error;

/// One broken field constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Error type for verdict validation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerdictError {
    /// Model output is not a JSON object
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Invalid verdict: {0}")]
    InvalidVerdict(String),

    #[error("{field} must be a number between 0.0 and 1.0, got {value}")]
    OutOfRange { field: &'static str, value: String },

    /// Every field constraint the response broke
    #[error("Response violates {} schema constraint(s): {}", .0.len(), join_violations(.0))]
    SchemaViolation(Vec<Violation>),
}

impl VerdictError {
    /// Violations carried by a `SchemaViolation`, empty otherwise
    pub fn violations(&self) -> &[Violation] {
        match self {
            VerdictError::SchemaViolation(violations) => violations,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
