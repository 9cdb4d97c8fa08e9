//! Structured verdict returned by the triage model

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum summary length, in characters
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Minimum reasoning length, in characters
pub const REASONING_MIN_CHARS: usize = 100;

/// Maximum reasoning length, in characters
pub const REASONING_MAX_CHARS: usize = 1000;

/// Classification of a DLP incident
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictKind {
    TruePositive,
    FalsePositive,
    RequiresReview,
}

impl VerdictKind {
    pub const ALL: [VerdictKind; 3] = [
        VerdictKind::TruePositive,
        VerdictKind::FalsePositive,
        VerdictKind::RequiresReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::TruePositive => "TRUE_POSITIVE",
            VerdictKind::FalsePositive => "FALSE_POSITIVE",
            VerdictKind::RequiresReview => "REQUIRES_REVIEW",
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerdictKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerdictKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Risk level of a confirmed incident
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Critical,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// String did not name a known enum variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// Validated analysis of one evidence file
///
/// Only produced by `service::verdict::validate_verdict`; an analyst
/// correction becomes a new feedback case instead of editing this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct Verdict {
    pub verdict: VerdictKind,

    #[schemars(
        description = "Confidence in the verdict between 0.0 and 1.0",
        range(min = 0.0, max = 1.0)
    )]
    pub confidence: f64,

    #[schemars(description = "Short summary of the analysis (max 200 characters)")]
    pub summary: String,

    #[schemars(
        description = "Detailed explanation of the verdict (between 100 and 1000 characters)"
    )]
    pub reasoning: String,

    /// Only meaningful for TRUE_POSITIVE, where it is required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Risk level; required when verdict is TRUE_POSITIVE")]
    pub risk_level: Option<RiskLevel>,

    #[schemars(description = "Technical indicators found in the evidence (at least one)")]
    pub indicators: Vec<String>,

    #[serde(default)]
    #[schemars(
        description = "Recommended actions for the SOC; must be empty for FALSE_POSITIVE"
    )]
    pub recommendations: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Why the alert is benign; only for FALSE_POSITIVE")]
    pub false_positive_reasons: Vec<String>,
}
