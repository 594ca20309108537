//! HTTP client for the local Ollama runtime.
//!
//! Only the non-streaming endpoints are used: `/api/tags` to list installed
//! models, `/api/embed` for batch embeddings and `/api/chat` for completions.

use crate::config::{ChatSettings, OllamaConfig};
use crate::domain::model::ChatMessage;
use crate::domain::ports::{ChatModel, Embedder};
use crate::utils::error::{RagError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Names of the models installed in the runtime, e.g. `llama3.2:3b`.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.endpoint("/api/tags");
        tracing::debug!("Listing models from {}", url);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, "<tags>").await?;
        let tags: TagsResponse = response.json().await?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether each model in `wanted` is installed, in the same order.
    pub async fn model_status(&self, wanted: &[&str]) -> Result<Vec<ModelStatus>> {
        let installed = self.list_models().await?;
        Ok(wanted
            .iter()
            .map(|model| ModelStatus {
                name: model.to_string(),
                installed: has_model(&installed, model),
            })
            .collect())
    }

    /// Fails with `ModelNotInstalled` for the first model in `wanted` that
    /// is missing from the runtime.
    pub async fn ensure_models(&self, wanted: &[&str]) -> Result<()> {
        require_installed(&self.model_status(wanted).await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStatus {
    pub name: String,
    pub installed: bool,
}

pub fn require_installed(statuses: &[ModelStatus]) -> Result<()> {
    match statuses.iter().find(|s| !s.installed) {
        Some(missing) => Err(RagError::ModelNotInstalled {
            model: missing.name.clone(),
        }),
        None => Ok(()),
    }
}

/// An untagged name refers to `:latest`, so `mxbai-embed-large` matches
/// `mxbai-embed-large:latest`.
pub fn has_model(installed: &[String], wanted: &str) -> bool {
    let normalize = |name: &str| {
        if name.contains(':') {
            name.to_string()
        } else {
            format!("{}:latest", name)
        }
    };
    let wanted = normalize(wanted);
    installed.iter().any(|name| normalize(name) == wanted)
}

async fn check_status(response: Response, model: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.clone()
            }
        });

    tracing::warn!("Ollama returned {} for model {}: {}", status, model, message);
    Err(RagError::ModelError {
        model: model.to_string(),
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.client.endpoint("/api/embed");
        tracing::debug!("Embedding {} texts with {}", texts.len(), self.model);

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response = self.client.client.post(&url).json(&request).send().await?;
        let response = check_status(response, &self.model).await?;
        let body: EmbedResponse = response.json().await?;

        if body.embeddings.len() != texts.len() {
            return Err(RagError::ProcessingError {
                message: format!(
                    "embedding model returned {} vectors for {} inputs",
                    body.embeddings.len(),
                    texts.len()
                ),
            });
        }

        Ok(body.embeddings)
    }
}

#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: OllamaClient,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OllamaChat {
    pub fn new(client: OllamaClient, model: impl Into<String>, settings: &ChatSettings) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self.client.endpoint("/api/chat");
        tracing::debug!("Sending {} messages to {}", messages.len(), self.model);

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };
        let response = self.client.client.post(&url).json(&request).send().await?;
        let response = check_status(response, &self.model).await?;
        let body: ChatResponse = response.json().await?;

        let content = body.message.content.trim().to_string();
        if content.is_empty() {
            return Err(RagError::ProcessingError {
                message: format!("model '{}' returned an empty answer", self.model),
            });
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> OllamaClient {
        OllamaClient::new(server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_has_model_handles_latest_tag() {
        let installed = vec![
            "llama3.2:3b".to_string(),
            "mxbai-embed-large:latest".to_string(),
        ];
        assert!(has_model(&installed, "llama3.2:3b"));
        assert!(has_model(&installed, "mxbai-embed-large"));
        assert!(has_model(&installed, "mxbai-embed-large:latest"));
        assert!(!has_model(&installed, "llama3.2:1b"));
        assert!(!has_model(&installed, "llama3.2"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(serde_json::json!({
                "models": [
                    {"name": "llama3.2:3b", "size": 2019393189u64},
                    {"name": "mxbai-embed-large:latest"}
                ]
            }));
        });

        let models = client(&server).list_models().await.unwrap();

        mock.assert();
        assert_eq!(models, vec!["llama3.2:3b", "mxbai-embed-large:latest"]);
    }

    #[tokio::test]
    async fn test_ensure_models_reports_missing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200)
                .json_body(serde_json::json!({"models": [{"name": "llama3.2:3b"}]}));
        });

        let err = client(&server)
            .ensure_models(&["llama3.2:3b", "mxbai-embed-large"])
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::ModelNotInstalled { ref model } if model == "mxbai-embed-large"));
    }

    #[tokio::test]
    async fn test_model_status_keeps_order() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200)
                .json_body(serde_json::json!({"models": [{"name": "nomic-embed-text:latest"}]}));
        });

        let statuses = client(&server)
            .model_status(&["llama3.2:3b", "nomic-embed-text"])
            .await
            .unwrap();

        assert_eq!(statuses.len(), 2);
        assert!(!statuses[0].installed);
        assert!(statuses[1].installed);
        assert!(require_installed(&statuses[1..]).is_ok());
        assert!(matches!(
            require_installed(&statuses),
            Err(RagError::ModelNotInstalled { ref model }) if model == "llama3.2:3b"
        ));
    }

    #[tokio::test]
    async fn test_embed_sends_batch() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/embed")
                .json_body(serde_json::json!({
                    "model": "mxbai-embed-large",
                    "input": ["alpha", "beta"]
                }));
            then.status(200).json_body(serde_json::json!({
                "model": "mxbai-embed-large",
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            }));
        });

        let embedder = OllamaEmbedder::new(client(&server), "mxbai-embed-large");
        let vectors = embedder
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/embed");
            then.status(200)
                .json_body(serde_json::json!({"embeddings": [[0.1, 0.2]]}));
        });

        let embedder = OllamaEmbedder::new(client(&server), "mxbai-embed-large");
        let err = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::ProcessingError { .. }));
    }

    #[tokio::test]
    async fn test_chat_passes_options_and_trims_answer() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .json_body_partial(r#"{"model": "llama3.2:3b", "stream": false, "options": {"num_predict": 300}}"#);
            then.status(200).json_body(serde_json::json!({
                "model": "llama3.2:3b",
                "message": {"role": "assistant", "content": "  Hello there!\n"},
                "done": true
            }));
        });

        let chat = OllamaChat::new(client(&server), "llama3.2:3b", &ChatSettings::default());
        let answer = chat
            .chat(&[ChatMessage::system("be nice"), ChatMessage::user("hi")])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(answer, "Hello there!");
    }

    #[tokio::test]
    async fn test_chat_maps_error_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(404)
                .json_body(serde_json::json!({"error": "model \"nope\" not found, try pulling it first"}));
        });

        let chat = OllamaChat::new(client(&server), "nope", &ChatSettings::default());
        let err = chat.chat(&[ChatMessage::user("hi")]).await.unwrap_err();

        match err {
            RagError::ModelError {
                model,
                status,
                message,
            } => {
                assert_eq!(model, "nope");
                assert_eq!(status, 404);
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
