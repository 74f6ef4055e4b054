use bearmobile_common::{ConversationTurn, ModelChoice, Result, SupportError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::checkpoint::InMemoryCheckpointer;

pub const WELCOME_MESSAGE: &str =
    "영진모바일 고객지원에 오신 것을 환영합니다. 질문을 입력해 주세요 🐻";

#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: Uuid,
    pub thread_id: String,
    pub messages: Vec<ConversationTurn>,
    pub checkpointer: Arc<InMemoryCheckpointer>,
    pub first_question: bool,
    pub model: ModelChoice,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionState {
    fn new(model: ModelChoice) -> Self {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            session_id,
            thread_id: session_id.to_string(),
            messages: vec![ConversationTurn::assistant(WELCOME_MESSAGE)],
            checkpointer: Arc::new(InMemoryCheckpointer::new()),
            first_question: true,
            model,
            created_at: now,
            last_activity: now,
        }
    }
}

/// What a request handler needs to run one user turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: Uuid,
    pub first_question: bool,
    pub thread_id: String,
    pub checkpointer: Arc<InMemoryCheckpointer>,
    pub model: ModelChoice,
}

pub struct SessionManager {
    active_sessions: HashMap<Uuid, SessionState>,
    session_retention_hours: i64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::new_with_config(24)
    }

    pub fn new_with_config(session_retention_hours: i64) -> Self {
        Self {
            active_sessions: HashMap::new(),
            session_retention_hours,
        }
    }

    pub async fn create_session(&mut self, model: ModelChoice) -> Result<Uuid> {
        let session = SessionState::new(model);
        let session_id = session.session_id;
        self.active_sessions.insert(session_id, session);
        info!("Created new session {} using {}", session_id, model.model_id());
        Ok(session_id)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<&SessionState> {
        self.active_sessions
            .get(&session_id)
            .ok_or_else(|| SupportError::NotFound(format!("Session not found: {}", session_id)))
    }

    async fn get_session_mut(&mut self, session_id: Uuid) -> Result<&mut SessionState> {
        self.active_sessions
            .get_mut(&session_id)
            .ok_or_else(|| SupportError::NotFound(format!("Session not found: {}", session_id)))
    }

    /// Replaces the session with a fresh one under a new id. The model choice
    /// carries over; history, agent memory and the first-question flag do not.
    pub async fn reset_session(&mut self, session_id: Uuid) -> Result<Uuid> {
        let old = self
            .active_sessions
            .remove(&session_id)
            .ok_or_else(|| SupportError::NotFound(format!("Session not found: {}", session_id)))?;

        let new_id = self.create_session(old.model).await?;
        info!("Reset session {} -> {}", session_id, new_id);
        Ok(new_id)
    }

    /// Records the user's message and reports whether it is the first
    /// question since the session started or was last reset.
    pub async fn begin_turn(&mut self, session_id: Uuid, prompt: &str) -> Result<TurnContext> {
        let session = self.get_session_mut(session_id).await?;

        let first_question = session.first_question;
        session.first_question = false;
        session.messages.push(ConversationTurn::user(prompt));
        session.last_activity = Utc::now();

        debug!(
            "Turn started on session {} (first_question={})",
            session_id, first_question
        );
        Ok(TurnContext {
            session_id,
            first_question,
            thread_id: session.thread_id.clone(),
            checkpointer: session.checkpointer.clone(),
            model: session.model,
        })
    }

    pub async fn record_assistant(&mut self, session_id: Uuid, content: &str) -> Result<()> {
        let session = self.get_session_mut(session_id).await?;
        session.messages.push(ConversationTurn::assistant(content));
        session.last_activity = Utc::now();
        Ok(())
    }

    pub async fn history(&self, session_id: Uuid) -> Result<Vec<ConversationTurn>> {
        Ok(self.get_session(session_id).await?.messages.clone())
    }

    pub async fn set_model(&mut self, session_id: Uuid, model: ModelChoice) -> Result<()> {
        let session = self.get_session_mut(session_id).await?;
        session.model = model;
        session.last_activity = Utc::now();
        info!("Session {} switched to {}", session_id, model.model_id());
        Ok(())
    }

    pub async fn delete_session(&mut self, session_id: Uuid) -> Result<()> {
        match self.active_sessions.remove(&session_id) {
            Some(_) => {
                info!("Deleted session {}", session_id);
                Ok(())
            }
            None => Err(SupportError::NotFound(format!(
                "Session not found: {}",
                session_id
            ))),
        }
    }

    pub async fn cleanup_expired_sessions(&mut self) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::hours(self.session_retention_hours);
        let initial_count = self.active_sessions.len();

        self.active_sessions
            .retain(|_, session| session.last_activity > cutoff);

        let removed_count = initial_count - self.active_sessions.len();
        if removed_count > 0 {
            info!("Cleaned up {} expired sessions", removed_count);
        }

        Ok(removed_count)
    }

    pub async fn active_session_count(&self) -> usize {
        self.active_sessions.len()
    }
}
