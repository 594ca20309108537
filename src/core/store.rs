use crate::domain::model::{Chunk, IndexedChunk, ScoredChunk};
use crate::domain::ports::Storage;
use crate::utils::error::{RagError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const INDEX_FILE: &str = "index.json";
const INDEX_VERSION: u32 = 1;

/// On-disk layout of `index.json`.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    embedding_model: String,
    dimension: Option<usize>,
    updated_at: Option<DateTime<Utc>>,
    records: Vec<IndexedChunk>,
}

/// Exact nearest-neighbour index over chunk embeddings.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_model: String,
    dimension: Option<usize>,
    updated_at: Option<DateTime<Utc>>,
    records: Vec<IndexedChunk>,
    ids: HashSet<String>,
}

impl VectorIndex {
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            dimension: None,
            updated_at: None,
            records: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn records(&self) -> &[IndexedChunk] {
        &self.records
    }

    /// Returns `false` without inserting when the id is already present.
    pub fn insert(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<bool> {
        self.check_dimension(embedding.len())?;
        if self.ids.contains(&chunk.id) {
            return Ok(false);
        }

        let now = Utc::now();
        self.dimension = Some(embedding.len());
        self.updated_at = Some(now);
        self.ids.insert(chunk.id.clone());
        self.records.push(IndexedChunk {
            chunk,
            embedding,
            indexed_at: now,
        });
        Ok(true)
    }

    /// Top `k` chunks by cosine similarity, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| (i, cosine_similarity(query, &record.embedding)))
            .collect();
        // stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.records[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Sorted, de-duplicated list of indexed sources.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .records
            .iter()
            .map(|r| r.chunk.source.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        sources.sort();
        sources
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.ids.clear();
        self.dimension = None;
        self.updated_at = None;
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(RagError::EmbeddingDimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Reads the index from `storage`, or returns an empty one when nothing
    /// has been persisted yet.
    pub async fn load<S: Storage>(storage: &S, embedding_model: &str) -> Result<Self> {
        if !storage.exists(INDEX_FILE).await {
            tracing::debug!("No persisted index found, starting empty");
            return Ok(Self::new(embedding_model));
        }

        let data = storage.read_file(INDEX_FILE).await?;
        let persisted: PersistedIndex = serde_json::from_slice(&data)?;

        if persisted.version != INDEX_VERSION {
            return Err(RagError::ProcessingError {
                message: format!(
                    "unsupported index version {} (expected {})",
                    persisted.version, INDEX_VERSION
                ),
            });
        }
        if persisted.embedding_model != embedding_model && !persisted.records.is_empty() {
            return Err(RagError::EmbeddingModelMismatch {
                expected: persisted.embedding_model,
                found: embedding_model.to_string(),
            });
        }

        let ids = persisted.records.iter().map(|r| r.chunk.id.clone()).collect();
        tracing::info!("Loaded existing index with {} chunks", persisted.records.len());

        Ok(Self {
            embedding_model: embedding_model.to_string(),
            dimension: persisted.dimension,
            updated_at: persisted.updated_at,
            records: persisted.records,
            ids,
        })
    }

    pub async fn save<S: Storage>(&self, storage: &S) -> Result<()> {
        let persisted = PersistedIndex {
            version: INDEX_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            updated_at: self.updated_at,
            records: self.records.clone(),
        };
        let data = serde_json::to_vec(&persisted)?;
        storage.write_file(INDEX_FILE, &data).await?;
        tracing::debug!("Persisted index ({} bytes, {} chunks)", data.len(), self.len());
        Ok(())
    }
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
