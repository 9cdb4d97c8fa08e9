use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_DATABASE_URL: &str = "TRIAGE_DATABASE_URL";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/incidents.db";

const ENV_EVIDENCE_DIR: &str = "EVIDENCE_DIR";
const DEFAULT_EVIDENCE_DIR: &str = "./evidence";

const DEFAULT_FEEDBACK_LIMIT: usize = 5;
const DEFAULT_MAX_EVIDENCE_CHARS: usize = 50_000;

/// Prompt composition settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Number of feedback cases injected into each prompt
    pub feedback_limit: usize,
    /// Evidence longer than this is truncated before prompting
    pub max_evidence_chars: usize,
    /// Whether historical feedback is injected by default
    pub use_feedback: bool,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            feedback_limit: DEFAULT_FEEDBACK_LIMIT,
            max_evidence_chars: DEFAULT_MAX_EVIDENCE_CHARS,
            use_feedback: true,
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub triage: TriageConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub triage: TriageConfig,
    pub database_url: String,
    pub evidence_dir: PathBuf,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            triage: TriageConfig::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            evidence_dir: PathBuf::from(DEFAULT_EVIDENCE_DIR),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let database_url =
            std::env::var(ENV_DATABASE_URL).unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let evidence_dir = std::env::var(ENV_EVIDENCE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_EVIDENCE_DIR));

        let config_path = std::env::var(ENV_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let triage = Self::load_config_file(&config_path)
            .map(|cf| cf.triage)
            .unwrap_or_default();

        Self {
            triage,
            database_url,
            evidence_dir,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => parse_config(&contents, path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_config(contents: &str, path: &Path) -> Option<ConfigFile> {
    let contents = contents.trim();
    if contents.is_empty() {
        tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
        return Some(ConfigFile::default());
    }

    match serde_yaml::from_str(contents) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Loaded configuration from file");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_triage_section_keeps_defaults() {
        let config = parse_config("triage:\n  feedback_limit: 3\n", Path::new("config.yaml"))
            .expect("valid yaml");

        assert_eq!(config.triage.feedback_limit, 3);
        assert_eq!(config.triage.max_evidence_chars, DEFAULT_MAX_EVIDENCE_CHARS);
        assert!(config.triage.use_feedback);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("   \n", Path::new("config.yaml")).expect("defaults");
        assert_eq!(config.triage.feedback_limit, DEFAULT_FEEDBACK_LIMIT);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(parse_config("triage: [1, 2", Path::new("config.yaml")).is_none());
    }
}
