use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::model::AgentMessage;

/// Saved state of one agent thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub messages: Vec<AgentMessage>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Thread memory kept for the lifetime of a chat session.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    threads: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, thread_id: &str) -> Option<Checkpoint> {
        self.threads.read().await.get(thread_id).cloned()
    }

    pub async fn messages(&self, thread_id: &str) -> Vec<AgentMessage> {
        self.get(thread_id)
            .await
            .map(|checkpoint| checkpoint.messages)
            .unwrap_or_default()
    }

    /// Replaces the thread's messages, returning the new version.
    pub async fn put(&self, thread_id: &str, messages: Vec<AgentMessage>) -> u64 {
        let mut threads = self.threads.write().await;
        let version = threads.get(thread_id).map(|c| c.version + 1).unwrap_or(1);
        threads.insert(
            thread_id.to_string(),
            Checkpoint {
                thread_id: thread_id.to_string(),
                messages,
                version,
                updated_at: Utc::now(),
            },
        );
        debug!("Checkpoint {} saved at version {}", thread_id, version);
        version
    }

    pub async fn append(&self, thread_id: &str, extra: Vec<AgentMessage>) -> u64 {
        let mut messages = self.messages(thread_id).await;
        messages.extend(extra);
        self.put(thread_id, messages).await
    }
}
