use crate::config::settings::Settings;
use crate::domain::model::{ModelProfile, TaskType};
use crate::utils::error::{JarvisError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "jarvis.toml";

/// Built-in configuration used when no `jarvis.toml` is present.
pub const DEFAULT_CONFIG: &str = include_str!("../../jarvis.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub assistant: AssistantSection,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub fallback_chains: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantSection {
    pub name: Option<String>,
    #[serde(default = "default_task_name")]
    pub default_task: String,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            name: None,
            default_task: default_task_name(),
        }
    }
}

fn default_task_name() -> String {
    "general_chat".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub ollama_url: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_deepseek_base_url")]
    pub deepseek_base_url: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama_url: None,
            openai_base_url: default_openai_base_url(),
            deepseek_base_url: default_deepseek_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
            openai_api_key: None,
            anthropic_api_key: None,
            deepseek_api_key: None,
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_deepseek_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    pub performance_log: Option<PathBuf>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            retry_delay_ms: default_retry_delay_ms(),
            performance_log: None,
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub routing_keywords: Vec<String>,
    /// Model chain, primary first: `provider/tag` entries.
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub task_types: Vec<String>,
    pub priority: u32,
    pub memory_requirement_mb: u64,
}

impl AssistantConfig {
    /// Loads `path` when given; otherwise `jarvis.toml` in the working
    /// directory, or the built-in configuration when that file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    tracing::warn!(
                        "{} not found, using built-in configuration",
                        DEFAULT_CONFIG_PATH
                    );
                    Self::builtin()
                }
            }
        }
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(JarvisError::ConfigError {
                message: format!("Configuration file not found at: {}", path.display()),
            });
        }
        let content = std::fs::read_to_string(path).map_err(JarvisError::IoError)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Configuration loaded from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| JarvisError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables stay literal.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| JarvisError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(url) = &self.providers.ollama_url {
            validation::validate_url("providers.ollama_url", url)?;
        }
        validation::validate_url("providers.openai_base_url", &self.providers.openai_base_url)?;
        validation::validate_url("providers.deepseek_base_url", &self.providers.deepseek_base_url)?;
        validation::validate_url("providers.anthropic_base_url", &self.providers.anthropic_base_url)?;

        validation::validate_positive_number(
            "fallback.max_retries",
            u64::from(self.fallback.max_retries),
            1,
        )?;
        validation::validate_positive_number("fallback.timeout_seconds", self.fallback.timeout_seconds, 1)?;

        if self.tasks.is_empty() {
            return Err(JarvisError::ConfigValidationError {
                field: "tasks".to_string(),
                message: "At least one task must be configured".to_string(),
            });
        }
        validation::validate_unique_names("tasks", self.tasks.iter().map(|t| t.name.as_str()))?;

        for task in &self.tasks {
            validation::validate_non_empty_string("tasks.name", &task.name)?;
            for model in &task.models {
                validation::validate_model_reference(&format!("tasks.{}.models", task.name), model)?;
            }
        }

        for (chain_name, chain) in &self.fallback_chains {
            for model in chain {
                validation::validate_model_reference(&format!("fallback_chains.{}", chain_name), model)?;
            }
        }

        self.model_catalog()?;

        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn default_task(&self) -> &str {
        &self.assistant.default_task
    }

    /// The `[[models]]` catalog as profiles; empty when the section is absent.
    pub fn model_catalog(&self) -> Result<Vec<ModelProfile>> {
        self.models
            .iter()
            .map(|entry| {
                let task_types = entry
                    .task_types
                    .iter()
                    .map(|t| {
                        t.parse::<TaskType>().map_err(|reason| JarvisError::InvalidConfigValueError {
                            field: format!("models.{}.task_types", entry.name),
                            value: t.clone(),
                            reason,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ModelProfile {
                    name: entry.name.clone(),
                    task_types,
                    priority: entry.priority,
                    memory_requirement_mb: entry.memory_requirement_mb,
                    is_available: true,
                })
            })
            .collect()
    }

    pub fn ollama_url(&self, settings: &Settings) -> String {
        self.providers
            .ollama_url
            .clone()
            .unwrap_or_else(|| settings.ollama_url.clone())
    }

    pub fn openai_api_key(&self, settings: &Settings) -> Option<String> {
        resolve_secret(&self.providers.openai_api_key, &settings.openai_api_key)
    }

    pub fn anthropic_api_key(&self, settings: &Settings) -> Option<String> {
        resolve_secret(&self.providers.anthropic_api_key, &settings.anthropic_api_key)
    }

    pub fn deepseek_api_key(&self, settings: &Settings) -> Option<String> {
        resolve_secret(&self.providers.deepseek_api_key, &settings.deepseek_api_key)
    }
}

/// A configured secret wins unless it is empty or an unresolved `${VAR}`.
fn resolve_secret(configured: &Option<String>, fallback: &Option<String>) -> Option<String> {
    configured
        .as_ref()
        .filter(|v| !v.trim().is_empty() && !v.starts_with("${"))
        .cloned()
        .or_else(|| fallback.clone())
}

impl Validate for AssistantConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[assistant]
default_task = "chat"

[[tasks]]
name = "code"
routing_keywords = ["code"]
models = ["ollama/codellama:7b-instruct"]

[[tasks]]
name = "chat"
models = ["ollama/llama3:8b", "openai/gpt-4o-mini"]
"#;

    #[test]
    fn test_builtin_config_parses_and_validates() {
        let config = AssistantConfig::builtin().unwrap();
        config.validate().unwrap();

        assert_eq!(config.default_task(), "general_chat");
        assert_eq!(config.tasks[0].name, "code_analysis");
        assert_eq!(config.fallback.max_retries, 2);
        assert_eq!(config.model_catalog().unwrap().len(), 6);
        assert!(config.fallback_chains.contains_key("text"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AssistantConfig::from_toml_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.fallback.timeout_seconds, 60);
        assert_eq!(config.fallback.retry_delay_ms, 1000);
        assert!(config.fallback.performance_log.is_none());
        assert_eq!(config.providers.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.task("chat").unwrap().models.len(), 2);
        assert!(config.model_catalog().unwrap().is_empty());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("JARVIS_TEST_OLLAMA_URL", "http://gpu-box:11434");

        let content = r#"
[providers]
ollama_url = "${JARVIS_TEST_OLLAMA_URL}"
openai_api_key = "${JARVIS_TEST_UNSET_KEY}"

[[tasks]]
name = "general_chat"
models = ["ollama/llama3:8b"]
"#;
        let config = AssistantConfig::from_toml_str(content).unwrap();
        let settings = Settings::default();

        assert_eq!(config.ollama_url(&settings), "http://gpu-box:11434");
        assert_eq!(
            config.providers.openai_api_key.as_deref(),
            Some("${JARVIS_TEST_UNSET_KEY}")
        );
        assert!(config.openai_api_key(&settings).is_none());

        std::env::remove_var("JARVIS_TEST_OLLAMA_URL");
    }

    #[test]
    fn test_configured_key_overrides_settings() {
        let mut config = AssistantConfig::from_toml_str(MINIMAL).unwrap();
        let mut settings = Settings::default();
        settings.anthropic_api_key = Some("from-env".to_string());

        assert_eq!(config.anthropic_api_key(&settings).as_deref(), Some("from-env"));
        config.providers.anthropic_api_key = Some("from-file".to_string());
        assert_eq!(config.anthropic_api_key(&settings).as_deref(), Some("from-file"));
    }

    #[test]
    fn test_validation_rejects_bad_chain_entries() {
        let content = r#"
[[tasks]]
name = "chat"
models = ["llama3"]
"#;
        let config = AssistantConfig::from_toml_str(content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_tasks_and_zero_retries() {
        let duplicate = r#"
[[tasks]]
name = "chat"

[[tasks]]
name = "chat"
"#;
        assert!(AssistantConfig::from_toml_str(duplicate).unwrap().validate().is_err());

        let zero_retries = r#"
[fallback]
max_retries = 0

[[tasks]]
name = "chat"
"#;
        assert!(AssistantConfig::from_toml_str(zero_retries).unwrap().validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_task_type_in_catalog() {
        let content = r#"
[[tasks]]
name = "chat"

[[models]]
name = "llama3:8b"
task_types = ["juggling"]
priority = 1
memory_requirement_mb = 100
"#;
        let config = AssistantConfig::from_toml_str(content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = AssistantConfig::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.default_task(), "chat");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = AssistantConfig::load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(JarvisError::ConfigError { .. })));
    }
}
