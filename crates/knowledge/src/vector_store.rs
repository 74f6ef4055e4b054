use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::Embedder;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

/// Flat in-process similarity index persisted as one JSON file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: Option<usize>,
    entries: Vec<StoredEntry>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn entries(&self) -> &[StoredEntry] {
        &self.entries
    }

    pub fn add(
        &mut self,
        text: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Map<String, Value>,
    ) -> Result<Uuid> {
        let entry = StoredEntry {
            id: Uuid::new_v4(),
            text: text.into(),
            embedding,
            metadata,
            created_at: Utc::now(),
        };
        let id = entry.id;
        self.add_entry(entry)?;
        Ok(id)
    }

    pub fn add_entry(&mut self, entry: StoredEntry) -> Result<()> {
        match self.dimension {
            Some(dimension) if dimension != entry.embedding.len() => {
                anyhow::bail!(
                    "Embedding dimension mismatch: index uses {}, entry has {}",
                    dimension,
                    entry.embedding.len()
                );
            }
            None => self.dimension = Some(entry.embedding.len()),
            _ => {}
        }

        self.entries.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Option<StoredEntry> {
        let position = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(position))
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&StoredEntry) -> bool,
    {
        self.entries.retain(keep);
    }

    /// Nearest entries by cosine similarity, best first. Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                id: entry.id,
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(query, &entry.embedding),
                created_at: entry.created_at,
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    /// Embeds `texts` in batches and builds a store from them.
    pub async fn from_texts(
        texts: Vec<String>,
        metadatas: Vec<Map<String, Value>>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        if metadatas.len() != texts.len() {
            anyhow::bail!(
                "Got {} texts but {} metadata records",
                texts.len(),
                metadatas.len()
            );
        }

        let mut store = Self::new();
        let batch_size = batch_size.max(1);

        for (batch_index, (text_batch, metadata_batch)) in texts
            .chunks(batch_size)
            .zip(metadatas.chunks(batch_size))
            .enumerate()
        {
            let embeddings = embedder.embed(text_batch).await?;
            if embeddings.len() != text_batch.len() {
                anyhow::bail!(
                    "Embedder returned {} vectors for {} texts",
                    embeddings.len(),
                    text_batch.len()
                );
            }

            for ((text, metadata), embedding) in text_batch
                .iter()
                .zip(metadata_batch.iter())
                .zip(embeddings)
            {
                store.add(text.clone(), embedding, metadata.clone())?;
            }
            debug!("Embedded batch {} ({} texts)", batch_index, text_batch.len());
        }

        Ok(store)
    }

    pub async fn save_local(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create index directory {}", dir.display()))?;

        let path = dir.join(INDEX_FILE);
        let json = serde_json::to_vec(self)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write index {}", path.display()))?;

        info!("Saved {} entries to {}", self.len(), path.display());
        Ok(())
    }

    pub async fn load_local(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(INDEX_FILE);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read index {}", path.display()))?;
        let store: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed index {}", path.display()))?;

        info!("Loaded {} entries from {}", store.len(), path.display());
        Ok(store)
    }

    pub async fn exists_at(dir: impl AsRef<Path>) -> bool {
        tokio::fs::try_exists(dir.as_ref().join(INDEX_FILE))
            .await
            .unwrap_or(false)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_score() {
        let mut store = VectorStore::new();
        store.add("east", vec![1.0, 0.0], Map::new()).unwrap();
        store.add("north", vec![0.0, 1.0], Map::new()).unwrap();
        store.add("north-east", vec![1.0, 1.0], Map::new()).unwrap();

        let hits = store.search(&[0.0, 1.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "north");
        assert_eq!(hits[1].text, "north-east");
    }

    #[test]
    fn test_equal_scores_keep_insertion_order() {
        let mut store = VectorStore::new();
        store.add("first", vec![1.0, 0.0], Map::new()).unwrap();
        store.add("second", vec![2.0, 0.0], Map::new()).unwrap();

        let hits = store.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[1].text, "second");
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut store = VectorStore::new();
        store.add("a", vec![1.0, 0.0], Map::new()).unwrap();
        assert!(store.add("b", vec![1.0, 0.0, 0.0], Map::new()).is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_and_load_local() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::new();
        let mut metadata = Map::new();
        metadata.insert("answer".to_string(), Value::String("yes".to_string()));
        let id = store.add("question", vec![0.5, 0.5], metadata).unwrap();

        store.save_local(dir.path()).await.unwrap();
        assert!(VectorStore::exists_at(dir.path()).await);

        let loaded = VectorStore::load_local(dir.path()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].id, id);
        assert_eq!(loaded.entries()[0].metadata["answer"], "yes");
        assert_eq!(loaded.dimension(), Some(2));
    }

    #[tokio::test]
    async fn test_load_missing_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!VectorStore::exists_at(dir.path()).await);
        assert!(VectorStore::load_local(dir.path()).await.is_err());
    }
}
