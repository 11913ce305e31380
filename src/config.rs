//! Configuration resolution
//!
//! Environment variables take priority, then an optional TOML config file,
//! then compiled defaults. Secrets (the summary API key) are never
//! compiled in; a missing key is an error at startup so a misconfigured
//! deployment fails fast instead of failing on the first upload.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const ENV_PREFIX: &str = "WILDSNAP_";

/// Optional TOML config file contents
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub upload_dir: Option<PathBuf>,
    pub classifier_url: Option<String>,
    pub summary_api_url: Option<String>,
    pub summary_api_key: Option<String>,
    pub summary_model: Option<String>,
    pub collaborator_timeout_secs: Option<u64>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Directory that receives uploaded image files
    pub upload_dir: PathBuf,
    /// Base URL of the image classification service
    pub classifier_url: String,
    /// Chat-completions endpoint for summary generation
    pub summary_api_url: String,
    /// Bearer credential for the summary endpoint
    pub summary_api_key: String,
    /// Model name sent to the summary endpoint
    pub summary_model: String,
    /// Request timeout applied to both collaborator clients
    pub collaborator_timeout: Duration,
    /// Session cookie name
    pub cookie_name: String,
}

impl Config {
    /// Resolve configuration: ENV > TOML file > defaults
    pub fn resolve() -> AppResult<Self> {
        let toml_config = load_toml_config();

        let bind_addr = env_or("BIND_ADDR")
            .or(toml_config.bind_addr.clone())
            .unwrap_or_else(|| "127.0.0.1:5780".to_string());

        let database_path = env_or("DATABASE_PATH")
            .map(PathBuf::from)
            .or(toml_config.database_path.clone())
            .unwrap_or_else(|| PathBuf::from("wildsnap.db"));

        let upload_dir = env_or("UPLOAD_DIR")
            .map(PathBuf::from)
            .or(toml_config.upload_dir.clone())
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let classifier_url = env_or("CLASSIFIER_URL")
            .or(toml_config.classifier_url.clone())
            .unwrap_or_else(|| "http://127.0.0.1:8501".to_string());

        let summary_api_url = env_or("SUMMARY_API_URL")
            .or(toml_config.summary_api_url.clone())
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

        let summary_api_key = resolve_summary_api_key(&toml_config)?;

        let summary_model = env_or("SUMMARY_MODEL")
            .or(toml_config.summary_model.clone())
            .unwrap_or_else(|| "gpt-3.5-turbo".to_string());

        let timeout_secs = env_or("COLLABORATOR_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .or(toml_config.collaborator_timeout_secs)
            .unwrap_or(30);

        Ok(Config {
            bind_addr,
            database_path,
            upload_dir,
            classifier_url,
            summary_api_url,
            summary_api_key,
            summary_model,
            collaborator_timeout: Duration::from_secs(timeout_secs),
            cookie_name: "wildsnap_session".to_string(),
        })
    }

    /// Test configuration pointing at throwaway paths, no real credentials
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            database_path: PathBuf::from(":memory:"),
            upload_dir,
            classifier_url: "http://127.0.0.1:1".to_string(),
            summary_api_url: "http://127.0.0.1:1".to_string(),
            summary_api_key: "test-key".to_string(),
            summary_model: "test-model".to_string(),
            collaborator_timeout: Duration::from_secs(5),
            cookie_name: "wildsnap_session".to_string(),
        }
    }
}

fn env_or(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}

/// Resolve the summary API credential from ENV then TOML
fn resolve_summary_api_key(toml_config: &TomlConfig) -> AppResult<String> {
    let env_key = env_or("SUMMARY_API_KEY").filter(|k| !k.trim().is_empty());
    let toml_key = toml_config
        .summary_api_key
        .clone()
        .filter(|k| !k.trim().is_empty());

    if env_key.is_some() && toml_key.is_some() {
        warn!("Summary API key set in both environment and TOML; using environment");
    }

    if let Some(key) = env_key {
        info!("Summary API key loaded from environment");
        return Ok(key);
    }
    if let Some(key) = toml_key {
        info!("Summary API key loaded from TOML config");
        return Ok(key);
    }

    Err(AppError::Internal(
        "Summary API key not configured. Set WILDSNAP_SUMMARY_API_KEY or \
         add summary_api_key to ~/.config/wildsnap/config.toml"
            .to_string(),
    ))
}

/// Read the optional TOML config file, tolerating absence
fn load_toml_config() -> TomlConfig {
    let Some(path) = config_file_path() else {
        return TomlConfig::default();
    };
    if !path.exists() {
        return TomlConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring malformed config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        },
        Err(e) => {
            warn!("Could not read config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wildsnap").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_parses_partial_file() {
        let parsed: TomlConfig = toml::from_str(
            r#"
            bind_addr = "0.0.0.0:8080"
            summary_model = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.bind_addr.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(parsed.summary_model.as_deref(), Some("gpt-4o-mini"));
        assert!(parsed.summary_api_key.is_none());
    }

    #[test]
    fn toml_config_rejects_wrong_types() {
        let parsed: Result<TomlConfig, _> = toml::from_str("collaborator_timeout_secs = \"soon\"");
        assert!(parsed.is_err());
    }
}
