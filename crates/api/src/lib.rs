pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

use axum::Json;
use bearmobile_common::ApiResponse;
use serde::{Deserialize, Serialize};

pub use server::ApiServer;

pub use bearmobile_common;
pub use bearmobile_core;

/// Prefix shown in front of answers served from the semantic cache.
pub const CACHE_PREFIX: &str = "(cache) ";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub enable_websockets: bool,
    pub session_cleanup_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            enable_websockets: true,
            session_cleanup_interval_secs: 3600,
        }
    }
}

// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub version: String,
    pub uptime: u64,
    pub services: ServiceHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub cache_entries: usize,
    pub active_sessions: usize,
    pub tools: usize,
}

/// Text shown to the customer for an answer.
pub fn display_text(response: &str, cached: bool) -> String {
    if cached {
        format!("{}{}", CACHE_PREFIX, response)
    } else {
        response.to_string()
    }
}

pub fn create_success_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use bearmobile_common::ModelChoice;
    use bearmobile_core::{
        model::{AgentMessage, ChatModel, Completion, ToolSchema},
        providers::ModelFactory,
        tool_registry::ToolRegistry,
        CoreConfig, SupportCore,
    };
    use bearmobile_knowledge::{Cache, CacheConfig, HashingEmbedder};
    use std::sync::Arc;

    pub const ANSWER: &str = "가까운 영진모바일 매장을 방문해 주세요.";

    struct CannedModel;

    #[async_trait]
    impl ChatModel for CannedModel {
        fn provider(&self) -> &str {
            "mock"
        }

        fn model_id(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            _messages: &[AgentMessage],
            _tools: &[ToolSchema],
        ) -> anyhow::Result<Completion> {
            Ok(Completion {
                text: Some(ANSWER.to_string()),
                ..Completion::default()
            })
        }
    }

    struct CannedFactory;

    impl ModelFactory for CannedFactory {
        fn create(&self, _choice: ModelChoice) -> anyhow::Result<Arc<dyn ChatModel>> {
            Ok(Arc::new(CannedModel))
        }
    }

    pub fn test_core() -> Arc<SupportCore> {
        let cache = Arc::new(Cache::in_memory(
            Arc::new(HashingEmbedder::default()),
            CacheConfig::default(),
        ));
        Arc::new(
            SupportCore::new(
                CoreConfig::default(),
                cache,
                ToolRegistry::new(),
                "You are a support agent.".to_string(),
                Arc::new(CannedFactory),
            )
            .unwrap(),
        )
    }
}
