use crate::utils::error::{JarvisError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> JarvisError {
    JarvisError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Provider endpoints must be absolute http(s) URLs.
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.trim().is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    let url = Url::parse(url_str).map_err(|e| invalid(field_name, url_str, format!("Invalid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme '{}', expected http or https", scheme),
        )),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(field_name, value, format!("Must be at least {}", min_value)));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Cannot be empty"));
    }
    Ok(())
}

/// Model chain entries must look like `provider/tag`.
pub fn validate_model_reference(field_name: &str, value: &str) -> Result<()> {
    match value.split_once('/') {
        Some((provider, tag)) if !provider.trim().is_empty() && !tag.trim().is_empty() => Ok(()),
        _ => Err(invalid(
            field_name,
            value,
            "Expected 'provider/model', e.g. 'ollama/llama3:8b'",
        )),
    }
}

pub fn validate_unique_names<'a>(
    field_name: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(JarvisError::ConfigValidationError {
                field: field_name.to_string(),
                message: format!("Duplicate name '{}'", name),
            });
        }
    }
    Ok(())
}

/// Returns the names in `required` that are missing from `present`.
pub fn missing_fields<'a>(
    required: &'a [&'a str],
    present: impl Fn(&str) -> bool,
) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|field| !present(field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("providers.ollama_url", "http://localhost:11434").is_ok());
        assert!(validate_url("providers.ollama_url", "https://api.openai.com/v1").is_ok());
        assert!(validate_url("providers.ollama_url", "").is_err());
        assert!(validate_url("providers.ollama_url", "localhost").is_err());
        assert!(validate_url("providers.ollama_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_model_reference() {
        assert!(validate_model_reference("tasks.models", "ollama/llama3:8b").is_ok());
        assert!(validate_model_reference("tasks.models", "openai/gpt-4o-mini").is_ok());
        assert!(validate_model_reference("tasks.models", "llama3").is_err());
        assert!(validate_model_reference("tasks.models", "/llama3").is_err());
        assert!(validate_model_reference("tasks.models", "ollama/").is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("tasks", ["a", "b"]).is_ok());
        assert!(validate_unique_names("tasks", ["a", "b", "a"]).is_err());
    }

    #[test]
    fn test_missing_fields() {
        let present = ["greeting"];
        let missing = missing_fields(&["greeting", "max_processing_time"], |f| present.contains(&f));
        assert_eq!(missing, vec!["max_processing_time"]);
    }
}
