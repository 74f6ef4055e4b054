pub mod agent;
pub mod checkpoint;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod session;
pub mod summarization;
pub mod tool_registry;
pub mod tools;

use bearmobile_common::{ModelChoice, Result, SupportError};
use bearmobile_knowledge::{Cache, CacheConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub use agent::{AgentEvent, OnEvent};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use session::{SessionManager, WELCOME_MESSAGE};

pub struct SupportCore {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<RwLock<SessionManager>>,
    pub cache: Arc<Cache>,
    pub config: CoreConfig,
}

impl SupportCore {
    pub fn new(
        config: CoreConfig,
        cache: Arc<Cache>,
        tools: tool_registry::ToolRegistry,
        system_prompt: String,
        model_factory: Arc<dyn providers::ModelFactory>,
    ) -> Result<Self> {
        let token_counter = summarization::TokenCounter::new()
            .map_err(|e| SupportError::Internal(format!("Tokenizer unavailable: {}", e)))?;
        let sessions = Arc::new(RwLock::new(SessionManager::new_with_config(
            config.session_retention_hours,
        )));

        info!(
            "Support core ready: {} tools, default model {}",
            tools.len(),
            config.default_model.model_id()
        );

        let orchestrator = Arc::new(Orchestrator::new(
            sessions.clone(),
            cache.clone(),
            Arc::new(tools),
            Arc::from(system_prompt),
            model_factory,
            Arc::new(token_counter),
            config.clone(),
        ));

        Ok(Self {
            orchestrator,
            sessions,
            cache,
            config,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub cache: CacheConfig,
    pub summarization: summarization::SummarizationPolicy,
    pub temperature: f32,
    pub default_model: ModelChoice,
    pub session_retention_hours: i64,
    pub qa_search_limit: usize,
    pub max_iterations: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            summarization: summarization::SummarizationPolicy::default(),
            temperature: 0.0,
            default_model: ModelChoice::default(),
            session_retention_hours: 24,
            qa_search_limit: tools::fetch_qa_content::DEFAULT_QA_LIMIT,
            max_iterations: agent::MAX_ITERATIONS,
        }
    }
}
