use bearmobile_common::{ModelChoice, Result, SupportError};
use bearmobile_knowledge::Cache;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    agent::{Agent, OnEvent},
    model::AgentMessage,
    providers::ModelFactory,
    session::SessionManager,
    summarization::TokenCounter,
    tool_registry::ToolRegistry,
    CoreConfig,
};

/// Result of one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub response: String,
    pub cached: bool,
}

/// Routes a user message through the semantic cache and the agent.
pub struct Orchestrator {
    sessions: Arc<RwLock<SessionManager>>,
    cache: Arc<Cache>,
    tools: Arc<ToolRegistry>,
    system_prompt: Arc<str>,
    model_factory: Arc<dyn ModelFactory>,
    token_counter: Arc<TokenCounter>,
    config: CoreConfig,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<RwLock<SessionManager>>,
        cache: Arc<Cache>,
        tools: Arc<ToolRegistry>,
        system_prompt: Arc<str>,
        model_factory: Arc<dyn ModelFactory>,
        token_counter: Arc<TokenCounter>,
        config: CoreConfig,
    ) -> Self {
        Self {
            sessions,
            cache,
            tools,
            system_prompt,
            model_factory,
            token_counter,
            config,
        }
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Handles one user message. Without a session id a new session is
    /// started. Only the first question of a session consults the cache, and
    /// only that question's answer is saved to it.
    pub async fn handle_turn(
        &self,
        session_id: Option<Uuid>,
        message: &str,
        model: Option<ModelChoice>,
        on_event: Option<&OnEvent>,
    ) -> Result<TurnOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SupportError::Validation("Message must not be empty".to_string()));
        }

        let turn = {
            let mut sessions = self.sessions.write().await;
            let session_id = match session_id {
                Some(id) => id,
                None => {
                    sessions
                        .create_session(model.unwrap_or(self.config.default_model))
                        .await?
                }
            };
            if let Some(model) = model {
                sessions.set_model(session_id, model).await?;
            }
            sessions.begin_turn(session_id, message).await?
        };

        if turn.first_question {
            match self.cache.search(message).await {
                Ok(Some(answer)) => {
                    info!("Cache hit for first question on session {}", turn.session_id);
                    turn.checkpointer
                        .append(
                            &turn.thread_id,
                            vec![AgentMessage::user(message), AgentMessage::assistant(&answer)],
                        )
                        .await;
                    self.sessions
                        .write()
                        .await
                        .record_assistant(turn.session_id, &answer)
                        .await?;
                    return Ok(TurnOutcome {
                        session_id: turn.session_id,
                        response: answer,
                        cached: true,
                    });
                }
                Ok(None) => debug!("Cache miss on session {}", turn.session_id),
                Err(e) => warn!("Cache lookup failed, asking the agent: {}", e),
            }
        }

        let chat_model = self
            .model_factory
            .create(turn.model)
            .map_err(|e| SupportError::Model(e.to_string()))?;

        let agent = Agent::new(
            chat_model,
            self.tools.clone(),
            self.system_prompt.clone(),
            self.token_counter.clone(),
        )
        .with_summarization(self.config.summarization.clone())
        .with_max_iterations(self.config.max_iterations);

        let result = agent
            .invoke(&turn.checkpointer, &turn.thread_id, message, on_event)
            .await
            .map_err(|e| SupportError::Model(e.to_string()))?;

        if turn.first_question && !result.text.trim().is_empty() {
            if let Err(e) = self.cache.save(message, &result.text).await {
                warn!("Failed to save answer to cache: {}", e);
            }
        }

        self.sessions
            .write()
            .await
            .record_assistant(turn.session_id, &result.text)
            .await?;

        info!(
            "Answered turn on session {} ({} iterations, {} tool calls, {} in / {} out tokens)",
            turn.session_id,
            result.iterations,
            result.tool_calls_made,
            result.usage.input_tokens,
            result.usage.output_tokens
        );
        Ok(TurnOutcome {
            session_id: turn.session_id,
            response: result.text,
            cached: false,
        })
    }
}
