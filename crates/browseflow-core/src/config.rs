use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Top-level browseflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Remote execution service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL; `/workflow/execute` etc. are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 { 30 }

fn default_user_agent() -> String {
    format!("browseflow/{}", env!("CARGO_PKG_VERSION"))
}

/// Status polling schedule. The timeout is attempt-based, so the ceiling is
/// `poll_interval_secs * max_poll_attempts` regardless of request latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_poll_interval() -> u64 { 5 }

fn default_max_poll_attempts() -> u32 { 60 }

/// Metadata stamped onto exported workflow definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_name")]
    pub name: String,
    #[serde(default = "default_workflow_description")]
    pub description: String,
    /// Refuse to submit documents that fail validation.
    #[serde(default = "default_validate_before_submit")]
    pub validate_before_submit: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: default_workflow_name(),
            description: default_workflow_description(),
            validate_before_submit: default_validate_before_submit(),
        }
    }
}

fn default_workflow_name() -> String {
    "Browser automation workflow".to_string()
}

fn default_workflow_description() -> String {
    "Workflow created from the editor".to_string()
}

fn default_validate_before_submit() -> bool { true }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// Load `path` if it exists, else `~/.browseflow/config.toml`, else defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        if let Some(home_config) = default_config_path() {
            if home_config.exists() {
                return Self::load(&home_config);
            }
        }
        tracing::debug!(path = %path.display(), "No config file found, using defaults");
        Ok(Self::default())
    }
}

/// `~/.browseflow/config.toml`, if HOME is set.
pub fn default_config_path() -> Option<PathBuf> {
    dirs_home().map(|h| h.join(".browseflow").join("config.toml"))
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_BROWSEFLOW_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_BROWSEFLOW_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_BROWSEFLOW_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_BROWSEFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_BROWSEFLOW_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.service.base_url, "http://localhost:8000");
        assert_eq!(config.service.request_timeout_secs, 30);
        assert_eq!(config.tracker.poll_interval_secs, 5);
        assert_eq!(config.tracker.max_poll_attempts, 60);
        assert!(config.workflow.validate_before_submit);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml_str = r#"
[tracker]
max_poll_attempts = 10
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tracker.max_poll_attempts, 10);
        assert_eq!(config.tracker.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/browseflow.toml")).unwrap_err();
        assert!(matches!(err, FlowError::ConfigNotFound(_)));
    }
}
