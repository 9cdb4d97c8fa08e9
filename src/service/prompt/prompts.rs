//! Prompt text for DLP incident triage

use std::sync::LazyLock;

use crate::model::{
    FeedbackCase, IncidentMetadata, REASONING_MAX_CHARS, REASONING_MIN_CHARS, SUMMARY_MAX_CHARS,
    Verdict,
};

/// Analyst role and decision criteria
pub const TRIAGE_SYSTEM_PROMPT: &str = r#"You are a senior Data Loss Prevention (DLP) analyst working in a Security Operations Center.

Your role is to triage DLP incidents: decide whether the flagged activity is a real
exfiltration or exposure of sensitive data, a benign business activity, or a case that
a human analyst must review.

Classify each incident as exactly one of:
- TRUE_POSITIVE: the evidence contains sensitive data (credentials, secrets, source code,
  personal data, financial or customer records, confidential documents) AND the action
  moves it somewhere it should not go (personal accounts, unapproved cloud storage,
  removable media, external recipients).
- FALSE_POSITIVE: the content is not sensitive, is public, is synthetic or test data, or
  the destination and action are an approved business workflow.
- REQUIRES_REVIEW: the evidence is insufficient, unreadable or ambiguous, or the decision
  depends on business context you cannot see.

You must:
- Base conclusions strictly on the incident metadata and the evidence provided
- Cite concrete technical indicators found in the evidence
- Be conservative: when unsure between TRUE_POSITIVE and FALSE_POSITIVE, use REQUIRES_REVIEW
- Learn from analyst corrections of previous cases when they are relevant

Do not:
- Invent file contents, users, destinations or business justifications
- Treat the policy severity alone as proof of a real incident
- Recommend response actions for FALSE_POSITIVE incidents

Your output must be structured JSON only and conform to the requested schema."#;

/// Heading of the historical feedback section
pub const FEEDBACK_SECTION_HEADING: &str = "## LEARNING FROM PREVIOUS CASES";

/// Rendered in place of feedback cases when none are available
pub const NO_FEEDBACK_NOTICE: &str = "No historical analyst feedback is available yet. Base your verdict solely on the criteria above and the evidence below.";

/// Substituted when a feedback case carries no lesson of its own
pub const FALLBACK_LESSON: &str = "Compare file type, destination and business context with this case before repeating the original verdict on similar evidence.";

const EVIDENCE_BEGIN: &str = "-----BEGIN EVIDENCE-----";
const EVIDENCE_END: &str = "-----END EVIDENCE-----";

/// JSON schema of the expected response
static VERDICT_SCHEMA: LazyLock<String> = LazyLock::new(|| {
    let schema = schemars::schema_for!(Verdict);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
});

/// Render the feedback section, or the no-feedback notice when `cases` is empty
pub fn render_feedback_section(cases: &[&FeedbackCase]) -> String {
    if cases.is_empty() {
        return format!("{FEEDBACK_SECTION_HEADING}\n\n{NO_FEEDBACK_NOTICE}");
    }

    let mut section = format!(
        "{FEEDBACK_SECTION_HEADING}\n\nAnalysts reviewed earlier verdicts and corrected some of them.\nApply these lessons when they are relevant to the evidence below.\n"
    );

    for (i, case) in cases.iter().enumerate() {
        let lesson = case
            .lesson_learned
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(FALLBACK_LESSON);

        section.push_str(&format!(
            "\n### Case #{}: {} ({})\n- Incident date: {}\n- Your original verdict: {}\n- Correct verdict: {}\n- Analyst comment: {}\n- Relevance: {:.2}\n- Lesson learned: {}\n",
            i + 1,
            case.file_name,
            case.file_type,
            case.incident_date,
            case.original_verdict,
            case.corrected_verdict,
            case.analyst_comment,
            case.relevance_score.value(),
            lesson
        ));
    }

    section
}

/// Render the incident-specific part of the prompt
///
/// `content` is expected to be already truncated; `truncated_at` is set when it was.
pub fn render_evidence_instructions(
    metadata: Option<&IncidentMetadata>,
    file_name: Option<&str>,
    content: &str,
    truncated_at: Option<usize>,
) -> String {
    let mut instructions = String::new();

    if let Some(metadata) = metadata {
        instructions.push_str(&format!(
            "## INCIDENT METADATA\n\nUser: {}\nViolated policy: {}\nSeverity: {}\nRisk score: {}/10\nAction: {}\nFile involved: {}\n\n",
            metadata.user,
            metadata.policy_name,
            metadata.severity,
            metadata.risk_score,
            metadata.action,
            metadata.file_name
        ));
    }

    match file_name {
        Some(name) => instructions.push_str(&format!("## EVIDENCE FILE: {name}\n\n")),
        None => instructions.push_str("## EVIDENCE FILE\n\n"),
    }

    instructions.push_str(EVIDENCE_BEGIN);
    instructions.push('\n');
    instructions.push_str(content);
    instructions.push('\n');
    instructions.push_str(EVIDENCE_END);
    instructions.push('\n');

    if let Some(limit) = truncated_at {
        instructions.push_str(&format!(
            "[Evidence truncated after {limit} characters; base your verdict on the portion shown.]\n"
        ));
    }

    instructions.push_str(&format!(
        r#"
## REQUIRED OUTPUT

Analyze the evidence above and respond with a single JSON object conforming to this schema:

{schema}

Rules:
- verdict: TRUE_POSITIVE | FALSE_POSITIVE | REQUIRES_REVIEW
- confidence: number between 0.0 and 1.0
- summary: at most {summary_max} characters
- reasoning: between {reasoning_min} and {reasoning_max} characters
- risk_level: CRITICAL | HIGH | MEDIUM | LOW, required for TRUE_POSITIVE
- indicators: at least one technical indicator found in the evidence
- recommendations: SOC actions; must be empty for FALSE_POSITIVE
- false_positive_reasons: only for FALSE_POSITIVE, at least one reason

Output JSON only."#,
        schema = VERDICT_SCHEMA.as_str(),
        summary_max = SUMMARY_MAX_CHARS,
        reasoning_min = REASONING_MIN_CHARS,
        reasoning_max = REASONING_MAX_CHARS,
    ));

    instructions
}
