use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::model::{AgentMessage, ChatModel, Completion, ToolCall, ToolSchema, Usage};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini models through the `generateContent` endpoint.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl GeminiModel {
    pub fn new(api_key: String, model: &str, temperature: Option<f32>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.to_string(),
            temperature,
        }
    }
}

pub(crate) fn build_request_body(
    temperature: Option<f32>,
    messages: &[AgentMessage],
    tools: &[ToolSchema],
) -> Value {
    let mut system = Vec::new();
    let mut contents = Vec::new();

    for message in messages {
        match message {
            AgentMessage::System { content } => system.push(content.clone()),
            AgentMessage::User { content } => contents.push(json!({
                "role": "user",
                "parts": [{"text": content}],
            })),
            AgentMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts = Vec::new();
                if let Some(text) = content.as_deref().filter(|text| !text.is_empty()) {
                    parts.push(json!({"text": text}));
                }
                for call in tool_calls {
                    parts.push(json!({
                        "functionCall": {"name": call.name, "args": call.arguments}
                    }));
                }
                if !parts.is_empty() {
                    contents.push(json!({"role": "model", "parts": parts}));
                }
            }
            AgentMessage::Tool { name, content, .. } => {
                // functionResponse.response must be an object
                let response = match serde_json::from_str::<Value>(content) {
                    Ok(value @ Value::Object(_)) => value,
                    Ok(other) => json!({ "result": other }),
                    Err(_) => json!({ "result": content }),
                };
                let part = json!({"functionResponse": {"name": name, "response": response}});

                // All responses to one model turn go back in a single user turn
                if let Some(parts) = contents
                    .last_mut()
                    .filter(|last| is_function_responses(last))
                    .and_then(|last| last["parts"].as_array_mut())
                {
                    parts.push(part);
                } else {
                    contents.push(json!({"role": "user", "parts": [part]}));
                }
            }
        }
    }

    let mut body = json!({ "contents": contents });
    if !system.is_empty() {
        body["systemInstruction"] = json!({"parts": [{"text": system.join("\n\n")}]});
    }
    if let Some(temperature) = temperature {
        body["generationConfig"] = json!({ "temperature": temperature });
    }
    if !tools.is_empty() {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }
    body
}

fn is_function_responses(content: &Value) -> bool {
    content["role"] == "user"
        && content["parts"].as_array().is_some_and(|parts| {
            !parts.is_empty() && parts.iter().all(|part| part.get("functionResponse").is_some())
        })
}

/// Gemini does not id its function calls, so ids are assigned by position.
pub(crate) fn parse_response(body: &Value) -> Result<Completion> {
    let Some(candidate) = body["candidates"].as_array().and_then(|c| c.first()) else {
        bail!("Gemini returned no candidates");
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate["content"]["parts"].as_array().into_iter().flatten() {
        if let Some(chunk) = part["text"].as_str() {
            text.push_str(chunk);
        } else if let Some(call) = part.get("functionCall") {
            tool_calls.push(ToolCall {
                id: format!("call_{}", tool_calls.len()),
                name: call["name"].as_str().unwrap_or_default().to_string(),
                arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }

    let usage = Usage {
        input_tokens: body["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
        output_tokens: body["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32,
    };

    Ok(Completion {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
        usage,
    })
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn provider(&self) -> &str {
        "google"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[AgentMessage], tools: &[ToolSchema]) -> Result<Completion> {
        let body = build_request_body(self.temperature, messages, tools);
        debug!("Gemini request: model={}, messages={}", self.model, messages.len());

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API_BASE, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Gemini request failed with status {}: {}", status, error_text);
        }

        let body: Value = response.json().await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_and_function_calls() {
        let messages = vec![
            AgentMessage::system("prompt"),
            AgentMessage::user("부산 매장"),
            AgentMessage::Assistant {
                content: None,
                tool_calls: vec![ToolCall {
                    id: "call_0".to_string(),
                    name: "fetch_stores_by_prefecture".to_string(),
                    arguments: json!({"prefecture": "부산"}),
                }],
            },
            AgentMessage::Tool {
                tool_call_id: "call_0".to_string(),
                name: "fetch_stores_by_prefecture".to_string(),
                content: "[1,2]".to_string(),
            },
        ];
        let body = build_request_body(None, &messages, &[]);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "prompt");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"]["prefecture"], "부산");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["result"],
            json!([1, 2])
        );
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_parallel_tool_results_share_one_turn() {
        let call = |id: &str, prefecture: &str| ToolCall {
            id: id.to_string(),
            name: "fetch_stores_by_prefecture".to_string(),
            arguments: json!({ "prefecture": prefecture }),
        };
        let result = |id: &str| AgentMessage::Tool {
            tool_call_id: id.to_string(),
            name: "fetch_stores_by_prefecture".to_string(),
            content: r#"{"stores": []}"#.to_string(),
        };
        let messages = vec![
            AgentMessage::user("서울이랑 부산 매장 알려줘"),
            AgentMessage::Assistant {
                content: None,
                tool_calls: vec![call("call_0", "서울"), call("call_1", "부산")],
            },
            result("call_0"),
            result("call_1"),
            AgentMessage::user("고마워요"),
        ];
        let body = build_request_body(None, &messages, &[]);

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1]["parts"].as_array().unwrap().len(), 2);
        let responses = contents[2]["parts"].as_array().unwrap();
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(responses.len(), 2);
        assert!(responses
            .iter()
            .all(|part| part["functionResponse"]["name"] == "fetch_stores_by_prefecture"));
        assert_eq!(contents[3]["parts"][0]["text"], "고마워요");
    }

    #[test]
    fn test_empty_model_turn_is_skipped() {
        let messages = vec![
            AgentMessage::user("안녕하세요"),
            AgentMessage::Assistant {
                content: Some(String::new()),
                tool_calls: Vec::new(),
            },
            AgentMessage::user("요금제 문의"),
        ];
        let body = build_request_body(None, &messages, &[]);
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_tools_are_declared() {
        let body = build_request_body(
            Some(0.0),
            &[AgentMessage::user("hi")],
            &[ToolSchema {
                name: "fetch_qa_content".to_string(),
                description: "FAQ".to_string(),
                parameters: json!({"type": "object"}),
            }],
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "fetch_qa_content"
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_parse_function_call() {
        let completion = parse_response(&json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "fetch_qa_content", "args": {"query": "eSIM"}}}
                ]}
            }],
            "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 5}
        }))
        .unwrap();

        assert!(completion.text.is_none());
        assert_eq!(completion.tool_calls[0].id, "call_0");
        assert_eq!(completion.tool_calls[0].arguments["query"], "eSIM");
        assert_eq!(completion.usage.input_tokens, 30);
    }

    #[test]
    fn test_no_candidates_is_an_error() {
        assert!(parse_response(&json!({"candidates": []})).is_err());
    }
}
