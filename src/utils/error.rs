use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Model '{model}' returned HTTP {status}: {message}")]
    ModelError {
        model: String,
        status: u16,
        message: String,
    },

    #[error("Model '{model}' is not installed in the local runtime")]
    ModelNotInstalled { model: String },

    #[error("Failed to load document {path}: {message}")]
    DocumentLoadError { path: String, message: String },

    #[error("Unsupported document type: {path}")]
    UnsupportedDocument { path: String },

    #[error("Embedding dimension mismatch: index has {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    #[error("Index was built with embedding model '{expected}', but '{found}' is configured")]
    EmbeddingModelMismatch { expected: String, found: String },

    #[error("No documents found in {directory}")]
    NoDocuments { directory: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Model,
    Document,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RagError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RagError::Http(_) => ErrorCategory::Network,
            RagError::Io(_) => ErrorCategory::Storage,
            RagError::Serialization(_) => ErrorCategory::Data,
            RagError::ConfigValidationError { .. }
            | RagError::InvalidConfigValueError { .. }
            | RagError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RagError::ModelError { .. } | RagError::ModelNotInstalled { .. } => {
                ErrorCategory::Model
            }
            RagError::DocumentLoadError { .. }
            | RagError::UnsupportedDocument { .. }
            | RagError::NoDocuments { .. } => ErrorCategory::Document,
            RagError::EmbeddingDimensionMismatch { .. }
            | RagError::EmbeddingModelMismatch { .. } => ErrorCategory::Storage,
            RagError::ProcessingError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RagError::UnsupportedDocument { .. } => ErrorSeverity::Low,
            RagError::Http(_) | RagError::ModelError { .. } => ErrorSeverity::Medium,
            RagError::DocumentLoadError { .. }
            | RagError::NoDocuments { .. }
            | RagError::ProcessingError { .. }
            | RagError::Serialization(_)
            | RagError::ModelNotInstalled { .. } => ErrorSeverity::High,
            RagError::ConfigValidationError { .. }
            | RagError::InvalidConfigValueError { .. }
            | RagError::MissingConfigError { .. }
            | RagError::EmbeddingDimensionMismatch { .. }
            | RagError::EmbeddingModelMismatch { .. }
            | RagError::Io(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            RagError::Http(_) => {
                "Make sure Ollama is running (`ollama serve`) and the base URL is correct".to_string()
            }
            RagError::Io(_) => "Check file permissions and available disk space".to_string(),
            RagError::Serialization(_) => {
                "The persisted index may be corrupted; run `rag-store rebuild`".to_string()
            }
            RagError::ConfigValidationError { field, .. }
            | RagError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' in the config file or environment", field)
            }
            RagError::MissingConfigError { field } => {
                format!("Set '{}' in the config file or environment", field)
            }
            RagError::ModelError { model, .. } => {
                format!("Check that '{}' is served correctly by Ollama and retry", model)
            }
            RagError::ModelNotInstalled { model } => format!("Run `ollama pull {}`", model),
            RagError::DocumentLoadError { .. } => {
                "Make sure the file exists and is readable UTF-8 text or PDF".to_string()
            }
            RagError::UnsupportedDocument { .. } => {
                "Only .txt, .md and .pdf files are indexed".to_string()
            }
            RagError::EmbeddingDimensionMismatch { .. }
            | RagError::EmbeddingModelMismatch { .. } => {
                "Run `rag-store rebuild` after changing the embedding model".to_string()
            }
            RagError::NoDocuments { directory } => {
                format!("Add PDF or TXT files to '{}'", directory)
            }
            RagError::ProcessingError { .. } => "Retry the request".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RagError::Http(e) if e.is_connect() => {
                "Cannot reach the local model runtime".to_string()
            }
            RagError::Http(e) if e.is_timeout() => "The model runtime timed out".to_string(),
            RagError::NoDocuments { .. } => {
                "No documents found. Please add PDF or TXT files to the data folder.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Process exit code for the binaries; `0` means the error is only a warning.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_drives_exit_code() {
        let err = RagError::ModelNotInstalled {
            model: "llama3.2:3b".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Model);
        assert_eq!(err.exit_code(), 1);
        assert!(err.recovery_suggestion().contains("ollama pull llama3.2:3b"));

        let err = RagError::UnsupportedDocument {
            path: "a.docx".to_string(),
        };
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_no_documents_message() {
        let err = RagError::NoDocuments {
            directory: "./data".to_string(),
        };
        assert!(err.user_friendly_message().starts_with("No documents found"));
        assert!(err.recovery_suggestion().contains("./data"));
    }
}
