use crate::core::store::{VectorIndex, INDEX_FILE};
use crate::domain::model::{Chunk, ScoredChunk, StoreStats, StoreStatus};
use crate::domain::ports::{Embedder, Storage};
use crate::utils::error::Result;
use std::collections::HashSet;

/// Embeds chunks, keeps them in a persisted [`VectorIndex`] and answers
/// similarity queries against it.
pub struct KnowledgeBase<E: Embedder, S: Storage> {
    embedder: E,
    storage: S,
    index: VectorIndex,
    batch_size: usize,
}

impl<E: Embedder, S: Storage> KnowledgeBase<E, S> {
    pub async fn open(embedder: E, storage: S, embedding_model: &str, batch_size: usize) -> Result<Self> {
        let index = VectorIndex::load(&storage, embedding_model).await?;
        Ok(Self {
            embedder,
            storage,
            index,
            batch_size: batch_size.max(1),
        })
    }

    /// Starts an empty index for `embedding_model` after deleting the
    /// persisted one unread, so neither a different model nor a corrupt file
    /// can get in the way.
    pub async fn create_fresh(
        embedder: E,
        storage: S,
        embedding_model: &str,
        batch_size: usize,
    ) -> Result<Self> {
        storage.remove_file(INDEX_FILE).await?;
        tracing::info!("Discarded persisted index, starting fresh with {}", embedding_model);
        Ok(Self {
            embedder,
            storage,
            index: VectorIndex::new(embedding_model),
            batch_size: batch_size.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Embeds and stores the chunks whose ids are not indexed yet. Returns the
    /// number of chunks added; the index is persisted only when that is > 0.
    pub async fn add_documents_incremental(&mut self, chunks: Vec<Chunk>) -> Result<usize> {
        let mut seen = HashSet::new();
        let total = chunks.len();
        let new_chunks: Vec<Chunk> = chunks
            .into_iter()
            .filter(|c| !self.index.contains(&c.id) && seen.insert(c.id.clone()))
            .collect();

        if new_chunks.is_empty() {
            tracing::info!("All {} chunks already indexed", total);
            return Ok(0);
        }

        tracing::info!(
            "Indexing {} new chunks ({} already present)",
            new_chunks.len(),
            total - new_chunks.len()
        );

        let mut added = 0;
        for batch in new_chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;

            for (chunk, embedding) in batch.iter().cloned().zip(embeddings) {
                if self.index.insert(chunk, embedding)? {
                    added += 1;
                }
            }
            tracing::debug!("Embedded batch of {} chunks", batch.len());
        }

        self.index.save(&self.storage).await?;
        Ok(added)
    }

    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let results = self.search_scored(query, k).await?;
        Ok(results.into_iter().map(|r| r.chunk).collect())
    }

    /// Like [`similarity_search`](Self::similarity_search) but keeps the
    /// scores and drops results below `score_threshold`.
    pub async fn similarity_search_with_relevance_scores(
        &self,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let results = self.search_scored(query, k).await?;
        Ok(results
            .into_iter()
            .filter(|r| r.score >= score_threshold)
            .collect())
    }

    async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed_query(query).await?;
        self.index.search(&query_vector, k)
    }

    pub fn stats(&self) -> StoreStats {
        let sources = self.index.sources();
        StoreStats {
            status: if self.index.is_empty() {
                StoreStatus::Empty
            } else {
                StoreStatus::Initialized
            },
            total_chunks: self.index.len(),
            unique_sources: sources.len(),
            sources,
            embedding_model: self.index.embedding_model().to_string(),
            dimension: self.index.dimension(),
            updated_at: self.index.updated_at(),
        }
    }

    /// Drops every chunk, in memory and on disk.
    pub async fn reset(&mut self) -> Result<()> {
        self.storage.remove_file(INDEX_FILE).await?;
        self.index.clear();
        tracing::info!("Vector store reset");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::ports::Embedder;
    use crate::utils::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Bag-of-keywords embedder: one dimension per keyword, so texts sharing
    /// keywords are similar.
    #[derive(Clone)]
    pub struct KeywordEmbedder {
        keywords: Vec<&'static str>,
        pub calls: Arc<AtomicUsize>,
    }

    impl KeywordEmbedder {
        pub fn new(keywords: &[&'static str]) -> Self {
            Self {
                keywords: keywords.to_vec(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    self.keywords
                        .iter()
                        .map(|kw| lower.matches(kw).count() as f32)
                        .collect()
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::KeywordEmbedder;
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn chunk(id: &str, source: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            source: source.to_string(),
            index: 0,
            content: content.to_string(),
        }
    }

    fn embedder() -> KeywordEmbedder {
        KeywordEmbedder::new(&["python", "coffee", "language", "refund", "machine"])
    }

    #[tokio::test]
    async fn test_incremental_updates_skip_existing_ids() {
        let dir = TempDir::new().unwrap();
        let mut kb = KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "kw", 8)
            .await
            .unwrap();

        let added = kb
            .add_documents_incremental(vec![
                chunk("doc1_chunk_0", "test1.txt", "First document content"),
                chunk("doc1_chunk_1", "test1.txt", "Second document content"),
            ])
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(kb.stats().total_chunks, 2);

        let added = kb
            .add_documents_incremental(vec![
                chunk("doc1_chunk_1", "test1.txt", "Second document content"),
                chunk("doc2_chunk_0", "test2.txt", "Third document content"),
                chunk("doc2_chunk_0", "test2.txt", "Third document content"),
            ])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let stats = kb.stats();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.unique_sources, 2);
        assert_eq!(stats.status, StoreStatus::Initialized);
    }

    #[tokio::test]
    async fn test_nothing_new_skips_embedding_and_persisting() {
        let dir = TempDir::new().unwrap();
        let embedder = embedder();
        let calls = embedder.calls.clone();
        let mut kb = KnowledgeBase::open(embedder, LocalStorage::new(dir.path()), "kw", 8)
            .await
            .unwrap();

        assert_eq!(kb.add_documents_incremental(Vec::new()).await.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("index.json").exists());
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let dir = TempDir::new().unwrap();
        let embedder = embedder();
        let calls = embedder.calls.clone();
        let mut kb = KnowledgeBase::open(embedder, LocalStorage::new(dir.path()), "kw", 2)
            .await
            .unwrap();

        let chunks = (0..5)
            .map(|i| chunk(&format!("c:{}", i), "c.txt", "python"))
            .collect();
        assert_eq!(kb.add_documents_incremental(chunks).await.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_relevance_threshold_is_selective() {
        let dir = TempDir::new().unwrap();
        let mut kb = KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "kw", 8)
            .await
            .unwrap();
        kb.add_documents_incremental(vec![
            chunk("test:0", "test.txt", "Python is a high-level programming language"),
            chunk("test:1", "test.txt", "Coffee is a popular beverage"),
            chunk("test:2", "test.txt", "Machine learning often uses Python"),
        ])
        .await
        .unwrap();

        let high = kb
            .similarity_search_with_relevance_scores("Python programming language", 3, 0.6)
            .await
            .unwrap();
        let low = kb
            .similarity_search_with_relevance_scores("Python programming language", 3, 0.3)
            .await
            .unwrap();

        assert!(high.len() <= low.len());
        assert!(high.iter().all(|r| r.score >= 0.6));
        assert_eq!(high[0].chunk.id, "test:0");
        assert!(!low.iter().any(|r| r.chunk.id == "test:1"));

        let plain = kb.similarity_search("coffee", 1).await.unwrap();
        assert_eq!(plain[0].id, "test:1");
    }

    #[tokio::test]
    async fn test_reopen_and_reset() {
        let dir = TempDir::new().unwrap();
        {
            let mut kb = KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "kw", 8)
                .await
                .unwrap();
            kb.add_documents_incremental(vec![chunk("a:0", "a.txt", "refund policy")])
                .await
                .unwrap();
        }

        let mut kb = KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "kw", 8)
            .await
            .unwrap();
        assert_eq!(kb.len(), 1);
        assert_eq!(
            kb.add_documents_incremental(vec![chunk("a:0", "a.txt", "refund policy")])
                .await
                .unwrap(),
            0
        );

        kb.reset().await.unwrap();
        assert!(kb.is_empty());
        assert_eq!(kb.stats().status, StoreStatus::Empty);
        assert!(!dir.path().join("index.json").exists());
    }

    #[tokio::test]
    async fn test_create_fresh_replaces_index_from_another_model() {
        let dir = TempDir::new().unwrap();
        let mut old = KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "old-model", 8)
            .await
            .unwrap();
        old.add_documents_incremental(vec![chunk("a:0", "a.txt", "refund policy")])
            .await
            .unwrap();

        let blocked = KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "new-model", 8).await;
        assert!(matches!(
            blocked,
            Err(crate::utils::error::RagError::EmbeddingModelMismatch { .. })
        ));

        let mut kb = KnowledgeBase::create_fresh(embedder(), LocalStorage::new(dir.path()), "new-model", 8)
            .await
            .unwrap();
        assert!(kb.is_empty());
        assert!(!dir.path().join("index.json").exists());

        kb.add_documents_incremental(vec![chunk("a:0", "a.txt", "refund policy")])
            .await
            .unwrap();
        let reopened = KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "new-model", 8)
            .await
            .unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.stats().embedding_model, "new-model");
    }

    #[tokio::test]
    async fn test_create_fresh_ignores_corrupt_index() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.json"), "{ not json").unwrap();
        assert!(KnowledgeBase::open(embedder(), LocalStorage::new(dir.path()), "kw", 8)
            .await
            .is_err());

        let kb = KnowledgeBase::create_fresh(embedder(), LocalStorage::new(dir.path()), "kw", 8)
            .await
            .unwrap();
        assert!(kb.is_empty());
        assert!(!dir.path().join("index.json").exists());
    }
}
