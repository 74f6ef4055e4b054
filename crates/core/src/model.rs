use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in an agent thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AgentMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl AgentMessage {
    pub fn system(content: impl Into<String>) -> Self {
        AgentMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        AgentMessage::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        AgentMessage::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, AgentMessage::Tool { .. })
    }

    /// Flattened text used for token counting and transcripts.
    pub fn render(&self) -> String {
        match self {
            AgentMessage::System { content } => format!("system: {}", content),
            AgentMessage::User { content } => format!("user: {}", content),
            AgentMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut text = format!("assistant: {}", content.as_deref().unwrap_or_default());
                for call in tool_calls {
                    text.push_str(&format!("\n[tool call {}({})]", call.name, call.arguments));
                }
                text
            }
            AgentMessage::Tool { name, content, .. } => format!("tool {}: {}", name, content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Response from one model call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

/// JSON-schema description of a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Chat model client (OpenAI, Anthropic, Google).
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn provider(&self) -> &str;

    /// Model identifier (e.g. "gpt-5-mini").
    fn model_id(&self) -> &str;

    async fn complete(&self, messages: &[AgentMessage], tools: &[ToolSchema])
        -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization_is_tagged() {
        let message = AgentMessage::Tool {
            tool_call_id: "call_1".to_string(),
            name: "fetch_qa_content".to_string(),
            content: "{}".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "tool");

        let back: AgentMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_render_includes_tool_calls() {
        let message = AgentMessage::Assistant {
            content: None,
            tool_calls: vec![ToolCall {
                id: "1".to_string(),
                name: "fetch_stores_by_prefecture".to_string(),
                arguments: serde_json::json!({"prefecture": "서울"}),
            }],
        };
        let rendered = message.render();
        assert!(rendered.starts_with("assistant: "));
        assert!(rendered.contains("fetch_stores_by_prefecture"));
    }
}
