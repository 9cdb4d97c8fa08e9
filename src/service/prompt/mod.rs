//! Prompt composition for incident triage
//!
//! Renders the system prompt, ranked analyst feedback and the evidence under
//! analysis into a single prompt string. Composition is pure: callers fetch
//! feedback and evidence themselves.

use crate::model::{Evidence, FeedbackCase, IncidentMetadata, TriageConfig};
use crate::service::feedback::selection::select_feedback;

pub mod error;
pub mod prompts;

pub use error::PromptError;

use prompts::{TRIAGE_SYSTEM_PROMPT, render_evidence_instructions, render_feedback_section};

/// Builds triage prompts
#[derive(Debug, Clone)]
pub struct PromptComposer {
    feedback_limit: usize,
    max_evidence_chars: usize,
}

impl PromptComposer {
    pub fn new(feedback_limit: usize, max_evidence_chars: usize) -> Self {
        Self {
            feedback_limit,
            max_evidence_chars,
        }
    }

    pub fn from_config(config: &TriageConfig) -> Self {
        Self::new(config.feedback_limit, config.max_evidence_chars)
    }

    pub fn feedback_limit(&self) -> usize {
        self.feedback_limit
    }

    /// Compose the prompt for one evidence file
    ///
    /// Fails with `PromptError::InvalidInput` when the evidence is empty,
    /// whitespace only, or not valid UTF-8.
    pub fn compose(
        &self,
        feedback: &[FeedbackCase],
        metadata: Option<&IncidentMetadata>,
        evidence: &Evidence,
    ) -> Result<String, PromptError> {
        let content = readable_content(evidence)?;
        let (content, truncated_at) = truncate_chars(content, self.max_evidence_chars);

        let selected = select_feedback(feedback, self.feedback_limit);
        let feedback_section = render_feedback_section(&selected);
        let instructions = render_evidence_instructions(
            metadata,
            evidence.file_name.as_deref(),
            content,
            truncated_at,
        );

        Ok(format!(
            "{TRIAGE_SYSTEM_PROMPT}\n\n{feedback_section}\n\n{instructions}"
        ))
    }
}

fn readable_content(evidence: &Evidence) -> Result<&str, PromptError> {
    let name = evidence.file_name.as_deref().unwrap_or("<inline>");

    if evidence.content.is_empty() {
        return Err(PromptError::InvalidInput(format!(
            "evidence '{name}' is empty"
        )));
    }

    let content = std::str::from_utf8(&evidence.content).map_err(|e| {
        PromptError::InvalidInput(format!("evidence '{name}' is not readable text: {e}"))
    })?;

    if content.trim().is_empty() {
        return Err(PromptError::InvalidInput(format!(
            "evidence '{name}' contains only whitespace"
        )));
    }

    Ok(content)
}

/// Cut `content` to at most `max_chars` characters
fn truncate_chars(content: &str, max_chars: usize) -> (&str, Option<usize>) {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&content[..byte_idx], Some(max_chars)),
        None => (content, None),
    }
}
