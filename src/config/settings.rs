//! Process-level settings read from environment variables.

use crate::utils::error::{JarvisError, Result};
use std::collections::HashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

const MASK: &str = "********";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub name: String,
    pub env: String,
    pub debug: bool,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub language: String,
    pub ollama_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
}

/// Secrets replaced by a mask; safe to print or log.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsSummary {
    pub name: String,
    pub env: String,
    pub debug: bool,
    pub log_level: String,
    pub log_file: Option<String>,
    pub data_dir: String,
    pub language: String,
    pub ollama_url: String,
    pub openai_api_key: Option<&'static str>,
    pub anthropic_api_key: Option<&'static str>,
    pub deepseek_api_key: Option<&'static str>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let home = get("HOME").or_else(|| get("USERPROFILE"));
        let default_data_dir = home
            .map(|h| Path::new(&h).join(".jarvis").join("data"))
            .unwrap_or_else(|| PathBuf::from(".jarvis").join("data"));

        // An explicitly empty LOG_FILE disables file logging.
        let log_file = match lookup("LOG_FILE") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(PathBuf::from("jarvis.log")),
        };

        Self {
            name: get("JARVIS_NAME").unwrap_or_else(|| "Jarvis".to_string()),
            env: get("JARVIS_ENV").unwrap_or_else(|| "development".to_string()),
            debug: get("DEBUG").map(|v| parse_bool(&v)).unwrap_or(false),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
            log_file,
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(default_data_dir),
            language: get("LANGUAGE").unwrap_or_else(|| "en-US".to_string()),
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| "http://localhost:11434".to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            deepseek_api_key: get("DEEPSEEK_API_KEY"),
        }
    }

    /// Reads settings from a dotenv file, with `lookup` taking precedence over
    /// the file the same way exported variables win over `.env`.
    pub fn from_env_file<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = dotenvy::from_path_iter(path)
            .and_then(|iter| iter.collect::<std::result::Result<HashMap<_, _>, _>>())
            .map_err(|e| JarvisError::ConfigError {
                message: format!("Failed to read {}: {}", path.display(), e),
            })?;
        Ok(Self::from_lookup(|key| {
            lookup(key).or_else(|| file.get(key).cloned())
        }))
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn to_summary(&self) -> SettingsSummary {
        let mask = |v: &Option<String>| v.as_ref().map(|_| MASK);
        SettingsSummary {
            name: self.name.clone(),
            env: self.env.clone(),
            debug: self.debug,
            log_level: self.log_level.clone(),
            log_file: self.log_file.as_ref().map(|p| p.display().to_string()),
            data_dir: self.data_dir.display().to_string(),
            language: self.language.clone(),
            ollama_url: self.ollama_url.clone(),
            openai_api_key: mask(&self.openai_api_key),
            anthropic_api_key: mask(&self.anthropic_api_key),
            deepseek_api_key: mask(&self.deepseek_api_key),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Loads `.env` from the working directory or a parent into the process
/// environment. Variables that are already set are kept.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(JarvisError::ConfigError {
            message: format!("Invalid .env file: {}", e),
        }),
    }
}

pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = Settings::default();
        assert_eq!(settings.name, "Jarvis");
        assert_eq!(settings.env, "development");
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "INFO");
        assert_eq!(settings.log_file, Some(PathBuf::from("jarvis.log")));
        assert_eq!(settings.ollama_url, "http://localhost:11434");
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("JARVIS_NAME", "Friday"),
            ("DEBUG", "True"),
            ("HOME", "/home/tony"),
            ("OPENAI_API_KEY", "sk-test"),
            ("DEEPSEEK_API_KEY", "   "),
            ("LOG_FILE", ""),
        ]));

        assert_eq!(settings.name, "Friday");
        assert!(settings.debug);
        assert_eq!(settings.data_dir, PathBuf::from("/home/tony/.jarvis/data"));
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert!(settings.deepseek_api_key.is_none());
        assert!(settings.log_file.is_none());
    }

    #[test]
    fn test_env_file_is_layered_under_environment() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        std::fs::write(
            &path,
            "# local overrides\nJARVIS_NAME=Friday\nOLLAMA_URL=http://gpu-box:11434\nOPENAI_API_KEY=\"sk-from-file\"\n",
        )
        .unwrap();

        let settings =
            Settings::from_env_file(&path, lookup_from(&[("OLLAMA_URL", "http://localhost:9999")]))
                .unwrap();

        assert_eq!(settings.name, "Friday");
        assert_eq!(settings.ollama_url, "http://localhost:9999");
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-from-file"));
        assert_eq!(settings.log_level, "INFO");
    }

    #[test]
    fn test_missing_env_file_is_a_config_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let err = Settings::from_env_file(&temp_dir.path().join(".env"), |_| None).unwrap_err();
        assert!(matches!(err, JarvisError::ConfigError { .. }));
    }

    #[test]
    fn test_summary_masks_secrets() {
        let settings = Settings::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "secret")]));
        let summary = serde_json::to_value(settings.to_summary()).unwrap();
        assert_eq!(summary["anthropic_api_key"], "********");
        assert!(summary["openai_api_key"].is_null());
        assert!(!summary.to_string().contains("secret"));
    }

    #[test]
    fn test_ensure_data_dir_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let data_dir = dir.path().join("nested").join("data");
        let settings = Settings::from_lookup(lookup_from(&[(
            "DATA_DIR",
            data_dir.to_str().unwrap(),
        )]));
        settings.ensure_data_dir().unwrap();
        assert!(data_dir.is_dir());
    }
}
