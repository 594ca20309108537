//! Index maintenance shared by `rag-store` and the chat `reload` command.

use crate::core::knowledge::KnowledgeBase;
use crate::core::loader::DocumentLoader;
use crate::domain::ports::{Embedder, Storage};
use crate::utils::error::Result;
use std::path::Path;

/// Outcome of loading documents into the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    /// Chunks produced by the loader, indexed or not.
    pub chunks_found: usize,
    pub chunks_added: usize,
}

impl IndexReport {
    pub fn found_nothing(&self) -> bool {
        self.chunks_found == 0
    }
}

/// Indexes the chunks of every document in `data_dir` that are not indexed yet.
pub async fn update_from_directory<E: Embedder, S: Storage>(
    knowledge: &mut KnowledgeBase<E, S>,
    loader: &DocumentLoader,
    data_dir: impl AsRef<Path>,
) -> Result<IndexReport> {
    let chunks = loader.load_documents(data_dir)?;
    index_chunks(knowledge, chunks).await
}

/// Indexes a single file. Unlike directory scans, load failures are returned.
pub async fn add_file<E: Embedder, S: Storage>(
    knowledge: &mut KnowledgeBase<E, S>,
    loader: &DocumentLoader,
    path: impl AsRef<Path>,
) -> Result<IndexReport> {
    let chunks = loader.load_single_document(path)?;
    index_chunks(knowledge, chunks).await
}

/// Discards the persisted index without reading it and indexes `data_dir`
/// from scratch. Works after an embedding model change or on a corrupt index.
pub async fn rebuild<E: Embedder, S: Storage>(
    embedder: E,
    storage: S,
    embedding_model: &str,
    batch_size: usize,
    loader: &DocumentLoader,
    data_dir: impl AsRef<Path>,
) -> Result<(KnowledgeBase<E, S>, IndexReport)> {
    let mut knowledge =
        KnowledgeBase::create_fresh(embedder, storage, embedding_model, batch_size).await?;
    let report = update_from_directory(&mut knowledge, loader, data_dir).await?;
    tracing::info!("Rebuilt index with {} chunks", knowledge.len());
    Ok((knowledge, report))
}

async fn index_chunks<E: Embedder, S: Storage>(
    knowledge: &mut KnowledgeBase<E, S>,
    chunks: Vec<crate::domain::model::Chunk>,
) -> Result<IndexReport> {
    let chunks_found = chunks.len();
    let chunks_added = if chunks_found == 0 {
        0
    } else {
        knowledge.add_documents_incremental(chunks).await?
    };
    Ok(IndexReport {
        chunks_found,
        chunks_added,
    })
}
