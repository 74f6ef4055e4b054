use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::model::{AgentMessage, ChatModel, Completion, ToolCall, ToolSchema, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Claude models through the Messages API.
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl AnthropicModel {
    pub fn new(api_key: String, model: &str, temperature: Option<f32>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.to_string(),
            temperature,
        }
    }
}

/// Request body for the Messages API. System messages go to the top-level
/// `system` field and consecutive tool results share one user message.
pub(crate) fn build_request_body(
    model: &str,
    temperature: Option<f32>,
    messages: &[AgentMessage],
    tools: &[ToolSchema],
) -> Value {
    let mut system = Vec::new();
    let mut converted: Vec<Value> = Vec::new();

    for message in messages {
        match message {
            AgentMessage::System { content } => system.push(content.clone()),
            AgentMessage::User { content } => converted.push(json!({
                "role": "user",
                "content": content,
            })),
            AgentMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut blocks = Vec::new();
                if let Some(text) = content.as_deref().filter(|text| !text.is_empty()) {
                    blocks.push(json!({"type": "text", "text": text}));
                }
                for call in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                // The Messages API rejects empty content
                if !blocks.is_empty() {
                    converted.push(json!({"role": "assistant", "content": blocks}));
                }
            }
            AgentMessage::Tool {
                tool_call_id,
                content,
                ..
            } => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": content,
                });
                let merged = converted.last_mut().and_then(|last| {
                    let is_result_batch = last["role"] == "user"
                        && last["content"]
                            .as_array()
                            .is_some_and(|blocks| blocks.iter().all(|b| b["type"] == "tool_result"));
                    if is_result_batch {
                        last["content"].as_array_mut()
                    } else {
                        None
                    }
                });
                match merged {
                    Some(blocks) => blocks.push(block),
                    None => converted.push(json!({"role": "user", "content": [block]})),
                }
            }
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": converted,
    });
    if !system.is_empty() {
        body["system"] = json!(system.join("\n\n"));
    }
    if let Some(temperature) = temperature {
        body["temperature"] = json!(temperature);
    }
    if !tools.is_empty() {
        body["tools"] = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect();
    }
    body
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

pub(crate) fn parse_response(body: Value) -> Result<Completion> {
    let response: AnthropicResponse = serde_json::from_value(body)?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text: chunk } => text.push_str(&chunk),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: input,
            }),
            ContentBlock::Other => {}
        }
    }

    Ok(Completion {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
        usage: Usage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        },
    })
}

#[async_trait]
impl ChatModel for AnthropicModel {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[AgentMessage], tools: &[ToolSchema]) -> Result<Completion> {
        let body = build_request_body(&self.model, self.temperature, messages, tools);
        debug!("Anthropic request: model={}, messages={}", self.model, messages.len());

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Anthropic request failed with status {}: {}", status, error_text);
        }

        parse_response(response.json().await?)
    }
}
