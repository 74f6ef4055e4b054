use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    checkpoint::InMemoryCheckpointer,
    model::{AgentMessage, ChatModel, ToolCall, Usage},
    summarization::{maybe_summarize, SummarizationPolicy, TokenCounter},
    tool_registry::ToolRegistry,
};

/// Maximum number of model calls per user turn.
pub const MAX_ITERATIONS: usize = 25;

/// Progress reported while the agent works on a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Iteration { iteration: usize },
    Thinking,
    ThinkingDone,
    Summarized { messages_removed: usize },
    ToolCallStart { id: String, name: String },
    ToolCallEnd { id: String, name: String, success: bool },
}

/// Callback for streaming events out of the agent.
pub type OnEvent = Box<dyn Fn(AgentEvent) + Send + Sync>;

#[derive(Debug)]
pub struct AgentRunResult {
    pub text: String,
    pub iterations: usize,
    pub tool_calls_made: usize,
    pub usage: Usage,
}

/// Tool-calling agent bound to one chat model.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: Arc<str>,
    policy: SummarizationPolicy,
    counter: Arc<TokenCounter>,
    max_iterations: usize,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        system_prompt: Arc<str>,
        counter: Arc<TokenCounter>,
    ) -> Self {
        Self {
            model,
            tools,
            system_prompt,
            policy: SummarizationPolicy::default(),
            counter,
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_summarization(mut self, policy: SummarizationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Runs one user turn on `thread_id`: model calls and tool executions
    /// repeat until the model answers without requesting tools. The thread is
    /// saved back to the checkpointer only when the turn completes.
    pub async fn invoke(
        &self,
        checkpointer: &InMemoryCheckpointer,
        thread_id: &str,
        user_message: &str,
        on_event: Option<&OnEvent>,
    ) -> Result<AgentRunResult> {
        let emit = |event: AgentEvent| {
            if let Some(cb) = on_event {
                cb(event);
            }
        };

        let tool_schemas = self.tools.schemas();
        let mut history = checkpointer.messages(thread_id).await;
        history.push(AgentMessage::user(user_message));

        let mut iterations = 0;
        let mut total_tool_calls = 0;
        let mut usage = Usage::default();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                warn!(
                    "Agent loop on thread {} exceeded {} iterations",
                    thread_id, self.max_iterations
                );
                bail!("agent loop exceeded max iterations");
            }
            emit(AgentEvent::Iteration {
                iteration: iterations,
            });

            let before = history.len();
            let (condensed, summarized) =
                maybe_summarize(self.model.as_ref(), &self.counter, &self.policy, history).await?;
            history = condensed;
            if summarized {
                emit(AgentEvent::Summarized {
                    messages_removed: before + 1 - history.len(),
                });
            }

            let mut request = Vec::with_capacity(history.len() + 1);
            request.push(AgentMessage::system(self.system_prompt.as_ref()));
            request.extend(history.iter().cloned());

            debug!(
                "Calling {} ({}) on thread {}, iteration {}",
                self.model.provider(),
                self.model.model_id(),
                thread_id,
                iterations
            );
            emit(AgentEvent::Thinking);
            let completion = self.model.complete(&request, &tool_schemas).await?;
            emit(AgentEvent::ThinkingDone);
            usage.add(completion.usage);

            if completion.tool_calls.is_empty() {
                let text = completion.text.unwrap_or_default();
                history.push(AgentMessage::Assistant {
                    content: Some(text.clone()),
                    tool_calls: Vec::new(),
                });
                checkpointer.put(thread_id, history).await;

                info!(
                    "Agent finished thread {} after {} iterations, {} tool calls",
                    thread_id, iterations, total_tool_calls
                );
                return Ok(AgentRunResult {
                    text,
                    iterations,
                    tool_calls_made: total_tool_calls,
                    usage,
                });
            }

            history.push(AgentMessage::Assistant {
                content: completion.text.clone(),
                tool_calls: completion.tool_calls.clone(),
            });

            for call in &completion.tool_calls {
                total_tool_calls += 1;
                emit(AgentEvent::ToolCallStart {
                    id: call.id.clone(),
                    name: call.name.clone(),
                });

                let (result, success) = self.run_tool(call).await;
                emit(AgentEvent::ToolCallEnd {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    success,
                });

                history.push(AgentMessage::Tool {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: result.to_string(),
                });
            }
        }
    }

    async fn run_tool(&self, call: &ToolCall) -> (serde_json::Value, bool) {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("Model requested unknown tool {}", call.name);
            return (
                serde_json::json!({ "error": format!("unknown tool: {}", call.name) }),
                false,
            );
        };

        match tool.execute(call.arguments.clone()).await {
            Ok(value) => (serde_json::json!({ "result": value }), true),
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                (serde_json::json!({ "error": e.to_string() }), false)
            }
        }
    }
}
