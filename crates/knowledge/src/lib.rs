//! FAQ index, embeddings and the semantic answer cache

pub mod embedding;
pub mod qa_corpus;
pub mod semantic_cache;
pub mod vector_store;

pub use embedding::{Embedder, HashingEmbedder, OpenAiEmbedder};
pub use semantic_cache::{Cache, CacheConfig, CACHE_STORE_PATH};
pub use vector_store::{SearchHit, VectorStore};
