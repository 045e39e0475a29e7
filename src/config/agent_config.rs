//! Per-agent settings read from `AGENT_<NAME>_*` environment variables.

use serde::Serialize;
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSettings {
    pub enabled: bool,
    pub log_level: String,
    pub max_retries: u32,
    /// Seconds between retries.
    pub retry_delay: f64,
    /// Seconds.
    pub timeout: f64,
    /// Variables that are not one of the known fields, keyed by lower-cased suffix.
    pub extra: Map<String, Value>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "INFO".to_string(),
            max_retries: 3,
            retry_delay: 1.0,
            timeout: 30.0,
            extra: Map::new(),
        }
    }
}

impl AgentSettings {
    pub fn from_env(agent_name: &str) -> Self {
        Self::from_vars(&env_prefix(agent_name), std::env::vars())
    }

    /// Builds settings from every `(key, value)` whose key starts with `prefix`.
    /// Values of the wrong type for a known field are ignored with a warning.
    pub fn from_vars<I>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut settings = Self::default();

        for (key, raw) in vars {
            let Some(field) = key.strip_prefix(prefix) else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            let value = coerce_value(&raw);

            let applied = match field.as_str() {
                "enabled" => value.as_bool().map(|v| settings.enabled = v).is_some(),
                "log_level" => {
                    settings.log_level = raw.trim().to_ascii_uppercase();
                    true
                }
                "max_retries" => value
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .map(|v| settings.max_retries = v)
                    .is_some(),
                "retry_delay" => value.as_f64().map(|v| settings.retry_delay = v).is_some(),
                "timeout" => value.as_f64().map(|v| settings.timeout = v).is_some(),
                _ => {
                    settings.extra.insert(field.clone(), value);
                    true
                }
            };

            if !applied {
                tracing::warn!("Ignoring {}: '{}' has the wrong type", key, raw);
            }
        }

        settings
    }

    /// Flattened view handed to agents as their configuration map.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("enabled".to_string(), Value::Bool(self.enabled));
        map.insert("log_level".to_string(), Value::String(self.log_level.clone()));
        map.insert("max_retries".to_string(), Value::from(self.max_retries));
        map.insert("retry_delay".to_string(), float_value(self.retry_delay));
        map.insert("timeout".to_string(), float_value(self.timeout));
        map
    }
}

pub fn env_prefix(agent_name: &str) -> String {
    format!("AGENT_{}_", agent_name.to_ascii_uppercase())
}

/// `true`/`false` become booleans, digit strings integers, a single-dot
/// decimal a float; anything else stays a string.
pub fn coerce_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = trimmed.parse::<u64>() {
            return Value::from(n);
        }
    }

    if trimmed.matches('.').count() == 1 {
        let digits = trimmed.replace('.', "");
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return float_value(f);
            }
        }
    }

    Value::String(raw.to_string())
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = AgentSettings::from_vars("AGENT_EXAMPLE_", Vec::new());
        assert_eq!(settings, AgentSettings::default());
        assert!(settings.enabled);
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn test_known_fields_and_extras() {
        let settings = AgentSettings::from_vars(
            "AGENT_EXAMPLE_",
            vars(&[
                ("AGENT_EXAMPLE_ENABLED", "False"),
                ("AGENT_EXAMPLE_MAX_RETRIES", "5"),
                ("AGENT_EXAMPLE_RETRY_DELAY", "2.5"),
                ("AGENT_EXAMPLE_LOG_LEVEL", "debug"),
                ("AGENT_EXAMPLE_GREETING", "Hi there"),
                ("AGENT_OTHER_ENABLED", "false"),
                ("PATH", "/usr/bin"),
            ]),
        );

        assert!(!settings.enabled);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.retry_delay, 2.5);
        assert_eq!(settings.log_level, "DEBUG");
        assert_eq!(settings.extra["greeting"], "Hi there");
        assert_eq!(settings.extra.len(), 1);
    }

    #[test]
    fn test_wrong_type_keeps_default() {
        let settings = AgentSettings::from_vars(
            "AGENT_EXAMPLE_",
            vars(&[("AGENT_EXAMPLE_MAX_RETRIES", "many")]),
        );
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value("TRUE"), Value::Bool(true));
        assert_eq!(coerce_value("42"), Value::from(42u64));
        assert_eq!(coerce_value("0.5"), Value::from(0.5));
        assert_eq!(coerce_value("1.2.3"), Value::String("1.2.3".to_string()));
        assert_eq!(coerce_value("-1"), Value::String("-1".to_string()));
    }

    #[test]
    fn test_to_map_contains_known_fields() {
        let map = AgentSettings::default().to_map();
        assert_eq!(map["enabled"], true);
        assert_eq!(map["timeout"], 30.0);
        assert_eq!(env_prefix("example_agent"), "AGENT_EXAMPLE_AGENT_");
    }
}
