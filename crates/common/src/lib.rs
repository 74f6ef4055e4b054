use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Conversation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One row of the FAQ corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
}

impl QaEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Text blob stored in the FAQ index for this row.
    pub fn to_index_text(&self) -> String {
        format!("question: {}\nanswer: {}", self.question, self.answer)
    }
}

// Model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelProvider {
    OpenAi,
    Anthropic,
    Google,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelChoice {
    #[default]
    #[serde(rename = "gpt-5-mini")]
    Gpt5Mini,
    #[serde(rename = "gpt-5.2")]
    Gpt52,
    #[serde(rename = "claude-sonnet-4-5")]
    ClaudeSonnet45,
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 4] = [
        ModelChoice::Gpt5Mini,
        ModelChoice::Gpt52,
        ModelChoice::ClaudeSonnet45,
        ModelChoice::Gemini25Flash,
    ];

    /// Label shown in the model picker.
    pub fn label(&self) -> &'static str {
        match self {
            ModelChoice::Gpt5Mini => "GPT-5 mini",
            ModelChoice::Gpt52 => "GPT-5.2",
            ModelChoice::ClaudeSonnet45 => "Claude Sonnet 4.5",
            ModelChoice::Gemini25Flash => "Gemini 2.5 Flash",
        }
    }

    /// Short identifier used in requests and config files.
    pub fn api_id(&self) -> &'static str {
        match self {
            ModelChoice::Gpt5Mini => "gpt-5-mini",
            ModelChoice::Gpt52 => "gpt-5.2",
            ModelChoice::ClaudeSonnet45 => "claude-sonnet-4-5",
            ModelChoice::Gemini25Flash => "gemini-2.5-flash",
        }
    }

    /// Identifier sent to the provider API.
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelChoice::Gpt5Mini => "gpt-5-mini",
            ModelChoice::Gpt52 => "gpt-5.2",
            ModelChoice::ClaudeSonnet45 => "claude-sonnet-4-5-20250929",
            ModelChoice::Gemini25Flash => "gemini-2.5-flash",
        }
    }

    pub fn provider(&self) -> ModelProvider {
        match self {
            ModelChoice::Gpt5Mini | ModelChoice::Gpt52 => ModelProvider::OpenAi,
            ModelChoice::ClaudeSonnet45 => ModelProvider::Anthropic,
            ModelChoice::Gemini25Flash => ModelProvider::Google,
        }
    }

    /// GPT-5 family models reject any temperature other than the default.
    pub fn supports_temperature(&self) -> bool {
        !matches!(self, ModelChoice::Gpt5Mini | ModelChoice::Gpt52)
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelChoice {
    type Err = SupportError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ModelChoice::ALL
            .into_iter()
            .find(|choice| {
                [choice.label(), choice.api_id(), choice.model_id()]
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| SupportError::Validation(format!("Unknown model: {}", wanted)))
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SupportError>;

// API response types
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}
