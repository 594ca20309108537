use crate::utils::error::{RagError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> RagError {
    RagError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Base URL of an HTTP service such as the Ollama runtime. Endpoint paths are
/// appended to it, so a query string or fragment is rejected.
pub fn validate_base_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.trim().is_empty() {
        return Err(RagError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid(field_name, url_str, "URL has no host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid(
            field_name,
            url_str,
            "Base URL cannot carry a query string or fragment",
        ));
    }
    Ok(())
}

/// A directory the crate reads from or creates. It may not exist yet, but it
/// must not be an existing regular file.
pub fn validate_directory(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(RagError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    if Path::new(path).is_file() {
        return Err(invalid(field_name, path, "Path points to a file, not a directory"));
    }
    Ok(())
}

/// Ollama model reference such as `llama3.2:3b`. Required, and whitespace
/// would never match an installed model.
pub fn validate_model_name(field_name: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RagError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid(field_name, name, "Model names cannot contain whitespace"));
    }
    Ok(())
}

pub fn validate_at_least(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(field_name, value, format!("Value must be at least {}", min_value)));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN fails both comparisons, so check containment rather than exclusion
    if !(value >= min && value <= max) {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("ollama.base_url", "http://localhost:11434").is_ok());
        assert!(validate_base_url("ollama.base_url", "https://ollama.internal/proxy").is_ok());
        assert!(validate_base_url("ollama.base_url", "localhost-11434").is_err());
        assert!(validate_base_url("ollama.base_url", "ftp://example.com").is_err());
        assert!(validate_base_url("ollama.base_url", "http://localhost:11434/?x=1").is_err());
        assert!(matches!(
            validate_base_url("ollama.base_url", ""),
            Err(RagError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_base_url_requires_host() {
        let err = validate_base_url("ollama.base_url", "http://").unwrap_err();
        assert!(matches!(err, RagError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_validate_directory() {
        assert!(validate_directory("store.persist_directory", "./vectorstore").is_ok());
        assert!(validate_directory("store.persist_directory", "bad\0path").is_err());
        assert!(matches!(
            validate_directory("documents.data_directory", "  "),
            Err(RagError::MissingConfigError { .. })
        ));

        let file = NamedTempFile::new().unwrap();
        let path = file.path().display().to_string();
        assert!(validate_directory("documents.data_directory", &path).is_err());
    }

    #[test]
    fn test_validate_model_name() {
        assert!(validate_model_name("ollama.chat_model", "llama3.2:3b").is_ok());
        assert!(validate_model_name("ollama.chat_model", "llama 3").is_err());
        assert!(matches!(
            validate_model_name("ollama.chat_model", "   "),
            Err(RagError::MissingConfigError { ref field }) if field == "ollama.chat_model"
        ));
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_at_least("chat.top_k", 5, 1).is_ok());
        assert!(validate_at_least("chat.top_k", 0, 1).is_err());
        assert!(validate_range("chat.temperature", 0.3, 0.0, 2.0).is_ok());
        assert!(validate_range("chat.temperature", 2.5, 0.0, 2.0).is_err());
        assert!(validate_range("chat.temperature", f64::NAN, 0.0, 2.0).is_err());
    }
}
