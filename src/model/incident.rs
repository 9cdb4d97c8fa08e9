//! DLP incident models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::UnknownVariant;

/// Placeholder for metadata fields the vendor record does not carry
const UNKNOWN: &str = "unknown";

/// Processing status of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    Analyzed,
    Error,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::Analyzed => "analyzed",
            IncidentStatus::Error => "error",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IncidentStatus::Pending),
            "analyzed" => Ok(IncidentStatus::Analyzed),
            "error" => Ok(IncidentStatus::Error),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Stored incident
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Incident {
    pub id: String,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    /// SHA-256 of the evidence bytes
    pub content_hash: Option<String>,
    pub user_email: Option<String>,
    /// Raw incident record as received from the DLP vendor
    #[schema(value_type = Option<Object>)]
    pub vendor_data: Option<Value>,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
}

/// Incident ready to be registered
#[derive(Debug, Clone, Default)]
pub struct NewIncident {
    pub id: String,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub content_hash: Option<String>,
    pub user_email: Option<String>,
    pub vendor_data: Option<Value>,
}

/// Incident metadata rendered into the analysis prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentMetadata {
    pub user: String,
    pub policy_name: String,
    pub severity: String,
    pub risk_score: f64,
    pub action: String,
    pub file_name: String,
}

impl IncidentMetadata {
    /// Extract prompt metadata from a vendor incident record
    ///
    /// Missing fields become `unknown` and a missing risk score becomes 0.
    pub fn from_vendor_json(record: &Value) -> Self {
        let text = |pointer: &str| {
            record
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let start_event = "/event_details/start_event";

        Self {
            user: text("/user/email")
                .or_else(|| text("/user/id"))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            policy_name: text("/policy/name").unwrap_or_else(|| UNKNOWN.to_string()),
            severity: text("/policy/severity").unwrap_or_else(|| UNKNOWN.to_string()),
            risk_score: record
                .get("risk_score")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            action: text(&format!("{start_event}/action/kind"))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            file_name: text(&format!("{start_event}/source/file/name"))
                .or_else(|| text("/file_info/name"))
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// Content of the file under analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    pub file_name: Option<String>,
    pub content: Vec<u8>,
}

impl Evidence {
    pub fn new(file_name: Option<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name,
            content: content.into(),
        }
    }
}

/// Lowercased extension of `file_name`, without the dot
pub fn file_type_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_from_vendor_record() {
        let record = json!({
            "user": {"id": "jdoe@example.com"},
            "policy": {"name": "Source code to personal cloud", "severity": "HIGH"},
            "risk_score": 8,
            "event_details": {
                "start_event": {
                    "action": {"kind": "upload"},
                    "source": {"file": {"name": "main.py"}}
                }
            }
        });

        let metadata = IncidentMetadata::from_vendor_json(&record);

        assert_eq!(metadata.user, "jdoe@example.com");
        assert_eq!(metadata.policy_name, "Source code to personal cloud");
        assert_eq!(metadata.severity, "HIGH");
        assert_eq!(metadata.risk_score, 8.0);
        assert_eq!(metadata.action, "upload");
        assert_eq!(metadata.file_name, "main.py");
    }

    #[test]
    fn test_metadata_defaults_for_missing_fields() {
        let metadata = IncidentMetadata::from_vendor_json(&json!({}));

        assert_eq!(metadata.user, "unknown");
        assert_eq!(metadata.policy_name, "unknown");
        assert_eq!(metadata.risk_score, 0.0);
    }

    #[test]
    fn test_file_type_is_lowercased_extension() {
        assert_eq!(file_type_of("Report.PDF"), Some("pdf".to_string()));
        assert_eq!(file_type_of("Makefile"), None);
    }
}
