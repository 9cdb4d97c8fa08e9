//! Evidence file loading
//!
//! Text formats are passed to the model as text. Other formats are replaced
//! by a descriptive placeholder; format-specific extraction happens upstream.

use std::path::{Component, Path};

use sha2::{Digest, Sha256};

use crate::model::{Evidence, file_type_of};

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "py", "js", "json", "xml", "csv", "log", "yaml", "yml", "sql",
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EvidenceError {
    #[error("Invalid evidence file name: {0}")]
    InvalidName(String),

    #[error("Evidence file not found: {0}")]
    NotFound(String),

    #[error("Failed to read evidence file: {0}")]
    Io(#[from] std::io::Error),
}

/// Evidence together with facts about the raw file
#[derive(Debug, Clone)]
pub struct LoadedEvidence {
    pub evidence: Evidence,
    pub file_type: Option<String>,
    pub file_size: i64,
    /// SHA-256 of the raw bytes
    pub content_hash: String,
}

impl LoadedEvidence {
    /// Describe evidence supplied inline rather than from disk
    pub fn inline(file_name: Option<String>, content: String) -> Self {
        let content = content.into_bytes();
        let file_type = file_name.as_deref().and_then(file_type_of);
        Self {
            file_size: content.len() as i64,
            content_hash: hash_bytes(&content),
            file_type,
            evidence: Evidence::new(file_name, content),
        }
    }
}

/// Load `file_name` from `dir`
///
/// `file_name` must be a plain file name: no directories, no `..`.
pub async fn load_evidence(dir: &Path, file_name: &str) -> Result<LoadedEvidence, EvidenceError> {
    validate_file_name(file_name)?;

    let path = dir.join(file_name);
    let raw = match tokio::fs::read(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EvidenceError::NotFound(file_name.to_string()));
        }
        Err(e) => return Err(EvidenceError::Io(e)),
    };

    let file_type = file_type_of(file_name);
    let content = render_content(file_name, file_type.as_deref(), &raw);

    tracing::debug!(
        file_name = %file_name,
        file_type = ?file_type,
        size = raw.len(),
        rendered_length = content.len(),
        "Loaded evidence file"
    );

    Ok(LoadedEvidence {
        evidence: Evidence::new(Some(file_name.to_string()), content),
        file_type,
        file_size: raw.len() as i64,
        content_hash: hash_bytes(&raw),
    })
}

fn validate_file_name(file_name: &str) -> Result<(), EvidenceError> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !file_name.contains('\\') => Ok(()),
        _ => Err(EvidenceError::InvalidName(file_name.to_string())),
    }
}

/// Prompt-ready text for a raw evidence file
fn render_content(file_name: &str, file_type: Option<&str>, raw: &[u8]) -> String {
    match file_type {
        Some(ext) if TEXT_EXTENSIONS.contains(&ext) => String::from_utf8_lossy(raw).into_owned(),
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => format!("[IMAGE FILE: {file_name}]"),
        Some(ext) => format!("[BINARY FILE: {file_name} - type: .{ext}]"),
        None => format!("[BINARY FILE: {file_name} - type: unknown]"),
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
