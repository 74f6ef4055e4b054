use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::{embed_query, Embedder};
use crate::vector_store::VectorStore;

/// Where the answer cache lives on disk.
pub const CACHE_STORE_PATH: &str = "./vectorstore/cache";

const ANSWER_KEY: &str = "answer";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Minimum cosine similarity for a hit.
    pub similarity_threshold: f32,
    /// Entry bound; 0 disables eviction.
    pub max_entries: usize,
    /// Entries older than this are never returned.
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.95,
            max_entries: 1000,
            ttl_secs: None,
        }
    }
}

struct CacheState {
    store: VectorStore,
    last_used: HashMap<Uuid, u64>,
    clock: u64,
}

impl CacheState {
    fn new(store: VectorStore) -> Self {
        let mut state = Self {
            store,
            last_used: HashMap::new(),
            clock: 0,
        };
        let ids: Vec<Uuid> = state.store.entries().iter().map(|entry| entry.id).collect();
        for id in ids {
            state.touch(id);
        }
        state
    }

    fn touch(&mut self, id: Uuid) {
        self.clock += 1;
        self.last_used.insert(id, self.clock);
    }

    fn evict_least_recently_used(&mut self) -> Option<Uuid> {
        let victim = self
            .store
            .entries()
            .iter()
            .min_by_key(|entry| self.last_used.get(&entry.id).copied().unwrap_or(0))
            .map(|entry| entry.id)?;

        self.store.remove(victim);
        self.last_used.remove(&victim);
        Some(victim)
    }
}

/// Answer cache keyed by question similarity.
///
/// A single instance is shared by every request handler. Writers are
/// serialised by the inner lock; embedding happens before the lock is taken.
pub struct Cache {
    embedder: Arc<dyn Embedder>,
    config: CacheConfig,
    state: RwLock<CacheState>,
    path: Option<PathBuf>,
}

impl Cache {
    /// Cache that is never written to disk.
    pub fn in_memory(embedder: Arc<dyn Embedder>, config: CacheConfig) -> Self {
        Self {
            embedder,
            config,
            state: RwLock::new(CacheState::new(VectorStore::new())),
            path: None,
        }
    }

    /// Opens the cache at its fixed location.
    pub async fn open(embedder: Arc<dyn Embedder>, config: CacheConfig) -> Result<Self> {
        Self::open_at(CACHE_STORE_PATH, embedder, config).await
    }

    pub async fn open_at(
        path: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        config: CacheConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = if VectorStore::exists_at(&path).await {
            VectorStore::load_local(&path).await?
        } else {
            info!("No cache at {}, starting empty", path.display());
            VectorStore::new()
        };

        Ok(Self {
            embedder,
            config,
            state: RwLock::new(CacheState::new(store)),
            path: Some(path),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.store.is_empty()
    }

    /// Returns the cached answer for the closest stored question, or `None`
    /// when nothing clears the similarity threshold.
    pub async fn search(&self, query: &str) -> Result<Option<String>> {
        if self.is_empty().await {
            debug!("Cache empty, skipping lookup");
            return Ok(None);
        }

        let embedding = embed_query(self.embedder.as_ref(), query).await?;
        let now = Utc::now();

        let mut state = self.state.write().await;
        let limit = state.store.len();
        let best = state
            .store
            .search(&embedding, limit)
            .into_iter()
            .find(|hit| !self.is_expired(hit.created_at, now));

        let Some(hit) = best else {
            debug!("Cache miss: no live entries");
            return Ok(None);
        };

        if hit.score < self.config.similarity_threshold {
            debug!(
                "Cache miss: best score {:.4} below threshold {:.4}",
                hit.score, self.config.similarity_threshold
            );
            return Ok(None);
        }

        match hit.metadata.get(ANSWER_KEY).and_then(Value::as_str) {
            Some(answer) => {
                state.touch(hit.id);
                info!("Cache hit (score {:.4}) for '{}'", hit.score, hit.text);
                Ok(Some(answer.to_string()))
            }
            None => {
                warn!("Cache entry {} has no answer metadata", hit.id);
                Ok(None)
            }
        }
    }

    /// Stores `answer` under `query`. Duplicates are not collapsed.
    pub async fn save(&self, query: &str, answer: &str) -> Result<()> {
        let embedding = embed_query(self.embedder.as_ref(), query).await?;
        let mut metadata = Map::new();
        metadata.insert(ANSWER_KEY.to_string(), Value::String(answer.to_string()));

        let now = Utc::now();
        let mut state = self.state.write().await;

        if let Some(ttl) = self.ttl() {
            let before = state.store.len();
            state.store.retain(|entry| now - entry.created_at < ttl);
            let live: Vec<Uuid> = state.store.entries().iter().map(|entry| entry.id).collect();
            state.last_used.retain(|id, _| live.contains(id));
            let expired = before - state.store.len();
            if expired > 0 {
                debug!("Dropped {} expired cache entries", expired);
            }
        }

        if self.config.max_entries > 0 {
            while state.store.len() >= self.config.max_entries {
                match state.evict_least_recently_used() {
                    Some(id) => debug!("Evicted cache entry {}", id),
                    None => break,
                }
            }
        }

        let id = state.store.add(query, embedding, metadata)?;
        state.touch(id);
        debug!("Cached answer for '{}' ({} entries)", query, state.store.len());

        if let Some(path) = &self.path {
            state.store.save_local(path).await?;
        }

        Ok(())
    }

    fn ttl(&self) -> Option<Duration> {
        self.config
            .ttl_secs
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .unwrap_or(Duration::MAX)
            })
    }

    fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.ttl() {
            Some(ttl) => now - created_at >= ttl,
            None => false,
        }
    }
}
