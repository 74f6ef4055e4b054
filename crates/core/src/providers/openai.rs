use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::model::{AgentMessage, ChatModel, Completion, ToolCall, ToolSchema, Usage};

/// GPT models through the Chat Completions API.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiModel {
    pub fn new(api_key: Option<String>, model: &str, temperature: Option<f32>) -> Self {
        // Without an explicit key the client falls back to OPENAI_API_KEY
        let config = match api_key {
            Some(key) => OpenAIConfig::new().with_api_key(key),
            None => OpenAIConfig::new(),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            temperature,
        }
    }
}

pub(crate) fn to_request_messages(
    messages: &[AgentMessage],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut converted = Vec::with_capacity(messages.len());
    for message in messages {
        let request_message = match message {
            AgentMessage::System { content } => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(content.clone())
                    .build()?,
            ),
            AgentMessage::User { content } => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(content.clone())
                    .build()?,
            ),
            AgentMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(text) = content {
                    args.content(text.clone());
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.to_string(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                ChatCompletionRequestMessage::Assistant(args.build()?)
            }
            AgentMessage::Tool {
                tool_call_id,
                content,
                ..
            } => ChatCompletionRequestMessage::Tool(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(tool_call_id.clone())
                    .content(content.clone())
                    .build()?,
            ),
        };
        converted.push(request_message);
    }
    Ok(converted)
}

pub(crate) fn to_request_tools(tools: &[ToolSchema]) -> Result<Vec<ChatCompletionTool>> {
    tools
        .iter()
        .map(|tool| {
            Ok(ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(
                    FunctionObjectArgs::default()
                        .name(tool.name.clone())
                        .description(tool.description.clone())
                        .parameters(tool.parameters.clone())
                        .build()?,
                )
                .build()?)
        })
        .collect()
}

pub(crate) fn from_response_tool_calls(calls: Vec<ChatCompletionMessageToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|call| {
            let arguments = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                warn!(
                    "Tool call {} had unparseable arguments: {}",
                    call.function.name, e
                );
                serde_json::json!({})
            });
            ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect()
}

#[async_trait]
impl ChatModel for OpenAiModel {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[AgentMessage], tools: &[ToolSchema]) -> Result<Completion> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(to_request_messages(messages)?);
        if !tools.is_empty() {
            args.tools(to_request_tools(tools)?);
        }
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args.build()?;

        debug!("OpenAI request: model={}, messages={}", self.model, messages.len());
        let response = self.client.chat().create(request).await.map_err(|e| {
            error!("OpenAI API error: {}", e);
            e
        })?;

        let usage = response
            .usage
            .map(|usage| Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            })
            .unwrap_or_default();

        let Some(choice) = response.choices.into_iter().next() else {
            anyhow::bail!("OpenAI returned no choices");
        };

        Ok(Completion {
            text: choice.message.content,
            tool_calls: from_response_tool_calls(choice.message.tool_calls.unwrap_or_default()),
            usage,
        })
    }
}
