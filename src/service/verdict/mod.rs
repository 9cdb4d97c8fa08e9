//! Validation of model output against the verdict contract
//!
//! The response is parsed into a JSON value first so every field can be
//! checked independently: verdict and confidence fail fast, all remaining
//! field constraints are reported together.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::model::{
    REASONING_MAX_CHARS, REASONING_MIN_CHARS, RiskLevel, SUMMARY_MAX_CHARS, Verdict, VerdictKind,
};

pub mod error;

pub use error::{VerdictError, Violation};

/// Risk level the model uses for "not applicable"
const RISK_LEVEL_NOT_APPLICABLE: &str = "N/A";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n(?P<body>.*?)\r?\n?\s*```\s*$")
        .expect("code fence pattern is valid")
});

/// Collects field violations
#[derive(Debug, Default)]
struct SchemaCheck {
    violations: Vec<Violation>,
}

impl SchemaCheck {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.violations.push(Violation {
            field,
            message: message.into(),
        });
    }

    fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    fn into_error(self) -> VerdictError {
        VerdictError::SchemaViolation(self.violations)
    }

    /// Required string field
    fn string(&mut self, fields: &Map<String, Value>, field: &'static str) -> Option<String> {
        match fields.get(field) {
            None | Some(Value::Null) => {
                self.add(field, "missing required field");
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.add(field, format!("expected a string, got {}", type_name(other)));
                None
            }
        }
    }

    /// String list; a missing optional list is empty
    fn string_list(
        &mut self,
        fields: &Map<String, Value>,
        field: &'static str,
        required: bool,
    ) -> Option<Vec<String>> {
        let items = match fields.get(field) {
            None | Some(Value::Null) if required => {
                self.add(field, "missing required field");
                return None;
            }
            None | Some(Value::Null) => return Some(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.add(field, format!("expected a list, got {}", type_name(other)));
                return None;
            }
        };

        let mut strings = Vec::with_capacity(items.len());
        let mut clean = true;
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => strings.push(s.clone()),
                other => {
                    self.add(
                        field,
                        format!("item {} is {}, expected a string", i + 1, type_name(other)),
                    );
                    clean = false;
                }
            }
        }

        clean.then_some(strings)
    }

    /// Risk level; `null` and "N/A" mean absent
    fn risk_level(&mut self, fields: &Map<String, Value>) -> Option<RiskLevel> {
        match fields.get("risk_level") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim() == RISK_LEVEL_NOT_APPLICABLE => None,
            Some(Value::String(s)) => match s.parse() {
                Ok(level) => Some(level),
                Err(_) => {
                    self.add(
                        "risk_level",
                        format!("unknown risk level '{s}', expected CRITICAL, HIGH, MEDIUM or LOW"),
                    );
                    None
                }
            },
            Some(other) => {
                self.add(
                    "risk_level",
                    format!("expected a string, got {}", type_name(other)),
                );
                None
            }
        }
    }
}

/// Parse and validate raw model output
///
/// Checks, in order:
/// 1. The output is a JSON object (an enclosing Markdown code fence is allowed)
/// 2. `verdict` is TRUE_POSITIVE, FALSE_POSITIVE or REQUIRES_REVIEW
/// 3. `confidence` is a number in [0.0, 1.0]
/// 4. Every other field constraint, reported together as `SchemaViolation`
pub fn validate_verdict(raw: &str) -> Result<Verdict, VerdictError> {
    let payload = strip_code_fence(raw);

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| VerdictError::MalformedResponse(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(VerdictError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            type_name(&value)
        )));
    };

    let verdict = parse_verdict_kind(fields.get("verdict"))?;
    let confidence = parse_confidence(fields.get("confidence"))?;

    let mut check = SchemaCheck::default();

    let summary = check.string(&fields, "summary");
    if let Some(ref summary) = summary {
        let len = summary.chars().count();
        if summary.trim().is_empty() {
            check.add("summary", "must not be blank");
        } else if len > SUMMARY_MAX_CHARS {
            check.add(
                "summary",
                format!("length {len} exceeds maximum of {SUMMARY_MAX_CHARS} characters"),
            );
        }
    }

    let reasoning = check.string(&fields, "reasoning");
    if let Some(ref reasoning) = reasoning {
        let len = reasoning.chars().count();
        if !(REASONING_MIN_CHARS..=REASONING_MAX_CHARS).contains(&len) {
            check.add(
                "reasoning",
                format!(
                    "length {len} outside allowed range of {REASONING_MIN_CHARS} to {REASONING_MAX_CHARS} characters"
                ),
            );
        }
    }

    let reported_before = check.violations.len();
    let risk_level = check.risk_level(&fields);
    let risk_level_reported = check.violations.len() > reported_before;
    if verdict == VerdictKind::TruePositive && risk_level.is_none() && !risk_level_reported {
        check.add("risk_level", "required when verdict is TRUE_POSITIVE");
    }

    let indicators = check.string_list(&fields, "indicators", true);
    if matches!(indicators, Some(ref items) if items.is_empty()) {
        check.add("indicators", "at least one indicator is required");
    }

    let recommendations = check.string_list(&fields, "recommendations", false);
    if verdict == VerdictKind::FalsePositive
        && matches!(recommendations, Some(ref items) if !items.is_empty())
    {
        check.add("recommendations", "must be empty when verdict is FALSE_POSITIVE");
    }

    let false_positive_reasons = check.string_list(&fields, "false_positive_reasons", false);
    if let Some(ref reasons) = false_positive_reasons {
        if verdict == VerdictKind::FalsePositive && reasons.is_empty() {
            check.add(
                "false_positive_reasons",
                "at least one reason is required when verdict is FALSE_POSITIVE",
            );
        } else if verdict != VerdictKind::FalsePositive && !reasons.is_empty() {
            check.add(
                "false_positive_reasons",
                format!("must be empty when verdict is {verdict}"),
            );
        }
    }

    match (
        summary,
        reasoning,
        indicators,
        recommendations,
        false_positive_reasons,
    ) {
        (
            Some(summary),
            Some(reasoning),
            Some(indicators),
            Some(recommendations),
            Some(false_positive_reasons),
        ) if check.is_clean() => Ok(Verdict {
            verdict,
            confidence,
            summary,
            reasoning,
            risk_level,
            indicators,
            recommendations,
            false_positive_reasons,
        }),
        _ => Err(check.into_error()),
    }
}

fn parse_verdict_kind(value: Option<&Value>) -> Result<VerdictKind, VerdictError> {
    match value {
        Some(Value::String(s)) => s.parse().map_err(|_| {
            VerdictError::InvalidVerdict(format!(
                "'{s}' is not one of TRUE_POSITIVE, FALSE_POSITIVE, REQUIRES_REVIEW"
            ))
        }),
        Some(other) => Err(VerdictError::InvalidVerdict(format!(
            "expected a string, got {}",
            type_name(other)
        ))),
        None => Err(VerdictError::InvalidVerdict(
            "missing required field 'verdict'".to_string(),
        )),
    }
}

fn parse_confidence(value: Option<&Value>) -> Result<f64, VerdictError> {
    let out_of_range = |value: String| VerdictError::OutOfRange {
        field: "confidence",
        value,
    };

    match value {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => Ok(c),
            _ => Err(out_of_range(n.to_string())),
        },
        Some(other) => Err(out_of_range(other.to_string())),
        None => Err(out_of_range("nothing".to_string())),
    }
}

/// Remove a Markdown code fence wrapping the whole response
fn strip_code_fence(raw: &str) -> &str {
    CODE_FENCE
        .captures(raw)
        .and_then(|caps| caps.name("body"))
        .map(|body| body.as_str())
        .unwrap_or(raw)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REASONING: &str = "The spreadsheet contains 1,200 rows of customer names, national ID numbers and card numbers, uploaded to a personal Dropbox account outside the approved tenant.";

    fn true_positive() -> Value {
        json!({
            "verdict": "TRUE_POSITIVE",
            "confidence": 0.92,
            "summary": "Customer PII uploaded to personal cloud storage",
            "reasoning": REASONING,
            "risk_level": "HIGH",
            "indicators": ["National ID numbers", "Personal Dropbox destination"],
            "recommendations": ["Contact the user's manager", "Revoke the shared link"],
            "false_positive_reasons": []
        })
    }

    fn false_positive() -> Value {
        json!({
            "verdict": "FALSE_POSITIVE",
            "confidence": 0.85,
            "summary": "Synthetic test data shared with QA vendor",
            "reasoning": REASONING,
            "risk_level": "N/A",
            "indicators": ["Values match the test data generator pattern"],
            "recommendations": [],
            "false_positive_reasons": ["All records are generated fixtures"]
        })
    }

    fn validate(value: &Value) -> Result<Verdict, VerdictError> {
        validate_verdict(&value.to_string())
    }

    fn violation_fields(err: &VerdictError) -> Vec<&'static str> {
        err.violations().iter().map(|v| v.field).collect()
    }

    #[test]
    fn test_valid_true_positive() {
        let verdict = validate(&true_positive()).unwrap();

        assert_eq!(verdict.verdict, VerdictKind::TruePositive);
        assert_eq!(verdict.risk_level, Some(RiskLevel::High));
        assert_eq!(verdict.indicators.len(), 2);
    }

    #[test]
    fn test_valid_false_positive_treats_na_as_absent() {
        let verdict = validate(&false_positive()).unwrap();

        assert_eq!(verdict.verdict, VerdictKind::FalsePositive);
        assert_eq!(verdict.risk_level, None);
        assert!(verdict.recommendations.is_empty());
    }

    #[test]
    fn test_optional_lists_may_be_omitted() {
        let mut value = true_positive();
        let fields = value.as_object_mut().unwrap();
        fields.remove("recommendations");
        fields.remove("false_positive_reasons");

        let verdict = validate(&value).unwrap();
        assert!(verdict.recommendations.is_empty());
        assert!(verdict.false_positive_reasons.is_empty());
    }

    #[test]
    fn test_code_fenced_response_is_accepted() {
        let raw = format!("```json\n{}\n```", true_positive());
        assert!(validate_verdict(&raw).is_ok());
    }

    #[test]
    fn test_unparseable_output_is_malformed() {
        let result = validate_verdict("The file looks dangerous.");
        assert!(matches!(result, Err(VerdictError::MalformedResponse(_))));

        let result = validate_verdict("[1, 2, 3]");
        assert!(matches!(result, Err(VerdictError::MalformedResponse(_))));
    }

    #[test]
    fn test_unknown_verdict_is_rejected() {
        let mut value = true_positive();
        value["verdict"] = json!("MAYBE");
        assert!(matches!(validate(&value), Err(VerdictError::InvalidVerdict(_))));

        value.as_object_mut().unwrap().remove("verdict");
        assert!(matches!(validate(&value), Err(VerdictError::InvalidVerdict(_))));
    }

    #[test]
    fn test_confidence_out_of_range() {
        for confidence in [json!(1.5), json!(-0.1), json!("high")] {
            let mut value = true_positive();
            value["confidence"] = confidence;
            assert!(matches!(
                validate(&value),
                Err(VerdictError::OutOfRange { field: "confidence", .. })
            ));
        }
    }

    #[test]
    fn test_confidence_bounds_are_inclusive() {
        for confidence in [json!(0), json!(1.0)] {
            let mut value = true_positive();
            value["confidence"] = confidence;
            assert!(validate(&value).is_ok());
        }
    }

    #[test]
    fn test_true_positive_requires_risk_level() {
        let mut value = true_positive();
        value.as_object_mut().unwrap().remove("risk_level");

        let err = validate(&value).unwrap_err();
        assert!(matches!(err, VerdictError::SchemaViolation(_)));
        assert_eq!(violation_fields(&err), ["risk_level"]);

        value["risk_level"] = json!("N/A");
        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["risk_level"]);
    }

    #[test]
    fn test_unknown_risk_level_reported_once() {
        let mut value = true_positive();
        value["risk_level"] = json!("SEVERE");

        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["risk_level"]);
        assert!(err.violations()[0].message.contains("SEVERE"));
    }

    #[test]
    fn test_false_positive_with_recommendations_fails() {
        let mut value = false_positive();
        value["recommendations"] = json!(["Block the user"]);

        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["recommendations"]);
    }

    #[test]
    fn test_false_positive_reasons_only_for_false_positive() {
        let mut value = true_positive();
        value["false_positive_reasons"] = json!(["Looks like a test"]);
        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["false_positive_reasons"]);

        let mut value = false_positive();
        value["false_positive_reasons"] = json!([]);
        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["false_positive_reasons"]);
    }

    #[test]
    fn test_indicators_must_be_non_empty_strings() {
        let mut value = true_positive();
        value["indicators"] = json!([]);
        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["indicators"]);

        value["indicators"] = json!(["ok", 42]);
        let err = validate(&value).unwrap_err();
        assert!(err.violations()[0].message.contains("item 2"));
    }

    #[test]
    fn test_all_violations_reported_together() {
        let mut value = true_positive();
        value["summary"] = json!("x".repeat(250));
        value["reasoning"] = json!("Too short.");
        value["indicators"] = json!([]);
        value.as_object_mut().unwrap().remove("risk_level");

        let err = validate(&value).unwrap_err();

        assert_eq!(
            violation_fields(&err),
            ["summary", "reasoning", "risk_level", "indicators"]
        );
        assert!(err.violations()[0].message.contains("length 250"));
        assert!(err.to_string().contains("4 schema constraint(s)"));
    }

    #[test]
    fn test_reasoning_length_counts_characters() {
        let mut value = true_positive();
        // 100 multi-byte characters are within bounds
        value["reasoning"] = json!("é".repeat(100));
        assert!(validate(&value).is_ok());

        value["reasoning"] = json!("é".repeat(1001));
        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["reasoning"]);
    }

    #[test]
    fn test_missing_fields_are_violations_not_defaults() {
        let value = json!({"verdict": "REQUIRES_REVIEW", "confidence": 0.4});

        let err = validate(&value).unwrap_err();
        assert_eq!(violation_fields(&err), ["summary", "reasoning", "indicators"]);
    }
}
