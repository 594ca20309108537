pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CommonArgs;

pub use adapters::ollama::{OllamaChat, OllamaClient, OllamaEmbedder};
pub use adapters::storage::LocalStorage;
pub use config::RagConfig;
pub use crate::core::{
    chatbot::RagChatbot, knowledge::KnowledgeBase, loader::DocumentLoader,
    maintenance::IndexReport, splitter::TextSplitter,
};
pub use utils::error::{RagError, Result};

/// Knowledge base wired to Ollama embeddings and the local persist directory.
pub type LocalKnowledgeBase = KnowledgeBase<OllamaEmbedder, LocalStorage>;

/// Builds the document loader described by `config`.
pub fn build_loader(config: &RagConfig) -> DocumentLoader {
    DocumentLoader::new(TextSplitter::new(
        config.documents.chunk_size,
        config.documents.chunk_overlap,
    ))
}

/// Opens (or creates) the persisted knowledge base described by `config`.
pub async fn open_knowledge_base(
    client: &OllamaClient,
    config: &RagConfig,
) -> Result<LocalKnowledgeBase> {
    let embedder = OllamaEmbedder::new(client.clone(), config.ollama.embedding_model.clone());
    let storage = LocalStorage::new(&config.store.persist_directory);
    KnowledgeBase::open(
        embedder,
        storage,
        &config.ollama.embedding_model,
        config.documents.embed_batch_size,
    )
    .await
}

/// Deletes the persisted index described by `config`, whatever model built
/// it, and re-indexes the data directory.
pub async fn rebuild_knowledge_base(
    client: &OllamaClient,
    config: &RagConfig,
) -> Result<(LocalKnowledgeBase, IndexReport)> {
    let embedder = OllamaEmbedder::new(client.clone(), config.ollama.embedding_model.clone());
    let storage = LocalStorage::new(&config.store.persist_directory);
    crate::core::maintenance::rebuild(
        embedder,
        storage,
        &config.ollama.embedding_model,
        config.documents.embed_batch_size,
        &build_loader(config),
        &config.documents.data_directory,
    )
    .await
}
