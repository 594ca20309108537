#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{RagError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub ollama: OllamaConfig,
    pub store: StoreConfig,
    pub documents: DocumentsConfig,
    pub chat: ChatSettings,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2:3b".to_string(),
            embedding_model: "mxbai-embed-large".to_string(),
            timeout_seconds: 120,
        }
    }
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub persist_directory: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_directory: "./vectorstore".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub data_directory: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            data_directory: "./data".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            embed_batch_size: 32,
        }
    }
}

/// Retrieval and conversation tuning used by the chatbot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to be used as context.
    pub relevance_threshold: f32,
    pub multi_query_count: usize,
    pub k_per_query: usize,
    /// Messages kept in memory (user and assistant counted separately).
    pub history_limit: usize,
    /// Messages rendered into each prompt.
    pub prompt_history: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 300,
            top_k: 5,
            relevance_threshold: 0.5,
            multi_query_count: 3,
            k_per_query: 3,
            history_limit: 20,
            prompt_history: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub name: String,
    pub company: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            name: "Alex".to_string(),
            company: "TechFlow Solutions".to_string(),
        }
    }
}

impl RagConfig {
    /// Load from a TOML file, or defaults when `path` is `None`, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RagError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables stay literal.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| RagError::ProcessingError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Applies the environment variables understood by the chatbot. `lookup`
    /// is `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.ollama.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.ollama.chat_model = v;
        }
        if let Some(v) = lookup("OLLAMA_EMBEDDING_MODEL") {
            self.ollama.embedding_model = v;
        }
        override_parsed(&lookup, "OLLAMA_TIMEOUT_SECONDS", &mut self.ollama.timeout_seconds)?;

        if let Some(v) = lookup("RAG_PERSIST_DIRECTORY").or_else(|| lookup("CHROMA_PERSIST_DIRECTORY")) {
            self.store.persist_directory = v;
        }
        if let Some(v) = lookup("RAG_DATA_DIRECTORY") {
            self.documents.data_directory = v;
        }
        override_parsed(&lookup, "CHUNK_SIZE", &mut self.documents.chunk_size)?;
        override_parsed(&lookup, "CHUNK_OVERLAP", &mut self.documents.chunk_overlap)?;
        override_parsed(&lookup, "EMBED_BATCH_SIZE", &mut self.documents.embed_batch_size)?;

        override_parsed(&lookup, "TEMPERATURE", &mut self.chat.temperature)?;
        override_parsed(&lookup, "MAX_TOKENS", &mut self.chat.max_tokens)?;
        override_parsed(&lookup, "TOP_K_RESULTS", &mut self.chat.top_k)?;
        override_parsed(&lookup, "RELEVANCE_THRESHOLD", &mut self.chat.relevance_threshold)?;
        override_parsed(&lookup, "MULTI_QUERY_COUNT", &mut self.chat.multi_query_count)?;
        override_parsed(&lookup, "K_PER_QUERY", &mut self.chat.k_per_query)?;
        override_parsed(&lookup, "HISTORY_LIMIT", &mut self.chat.history_limit)?;
        override_parsed(&lookup, "PROMPT_HISTORY", &mut self.chat.prompt_history)?;

        if let Some(v) = lookup("ASSISTANT_NAME") {
            self.assistant.name = v;
        }
        if let Some(v) = lookup("ASSISTANT_COMPANY") {
            self.assistant.company = v;
        }

        Ok(())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_base_url("ollama.base_url", &self.ollama.base_url)?;
        validation::validate_model_name("ollama.chat_model", &self.ollama.chat_model)?;
        validation::validate_model_name(
            "ollama.embedding_model",
            &self.ollama.embedding_model,
        )?;
        validation::validate_at_least(
            "ollama.timeout_seconds",
            self.ollama.timeout_seconds as usize,
            1,
        )?;

        validation::validate_directory("store.persist_directory", &self.store.persist_directory)?;
        validation::validate_directory("documents.data_directory", &self.documents.data_directory)?;

        validation::validate_at_least("documents.chunk_size", self.documents.chunk_size, 1)?;
        if self.documents.chunk_overlap >= self.documents.chunk_size {
            return Err(RagError::InvalidConfigValueError {
                field: "documents.chunk_overlap".to_string(),
                value: self.documents.chunk_overlap.to_string(),
                reason: format!(
                    "Overlap must be smaller than chunk_size ({})",
                    self.documents.chunk_size
                ),
            });
        }
        validation::validate_at_least(
            "documents.embed_batch_size",
            self.documents.embed_batch_size,
            1,
        )?;

        validation::validate_range("chat.temperature", self.chat.temperature, 0.0, 2.0)?;
        validation::validate_range(
            "chat.relevance_threshold",
            self.chat.relevance_threshold,
            -1.0,
            1.0,
        )?;
        validation::validate_at_least("chat.top_k", self.chat.top_k, 1)?;
        validation::validate_at_least(
            "chat.multi_query_count",
            self.chat.multi_query_count,
            1,
        )?;
        validation::validate_at_least("chat.k_per_query", self.chat.k_per_query, 1)?;
        validation::validate_at_least("chat.history_limit", self.chat.history_limit, 1)?;
        if self.chat.prompt_history > self.chat.history_limit {
            return Err(RagError::InvalidConfigValueError {
                field: "chat.prompt_history".to_string(),
                value: self.chat.prompt_history.to_string(),
                reason: format!(
                    "Cannot exceed chat.history_limit ({})",
                    self.chat.history_limit
                ),
            });
        }

        Ok(())
    }
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e: T::Err| RagError::InvalidConfigValueError {
                field: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

impl Validate for RagConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
