pub mod evidence;
pub mod feedback;
pub mod llm;
pub mod prompt;
pub mod triage;
pub mod verdict;

pub use feedback::FeedbackService;
pub use llm::{CompletionBackend, LlmClient};
pub use triage::TriageService;
