use anyhow::Result;
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::{debug, info};

use crate::model::{AgentMessage, ChatModel};

const SUMMARY_PREFIX: &str = "Here is a summary of the conversation to date:";

const SUMMARY_INSTRUCTIONS: &str = "You condense customer-support conversations. \
Write a short summary that keeps the customer's questions, any details they gave \
(region, device, plan, contract type), the answers already given and anything still \
unresolved. Reply with the summary only, in the customer's language.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationPolicy {
    pub max_tokens_before_summary: usize,
    pub messages_to_keep: usize,
}

impl Default for SummarizationPolicy {
    fn default() -> Self {
        Self {
            max_tokens_before_summary: 8000,
            messages_to_keep: 10,
        }
    }
}

pub struct TokenCounter {
    bpe: CoreBPE,
}

impl TokenCounter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::cl100k_base()?,
        })
    }

    pub fn count_text(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    pub fn count(&self, messages: &[AgentMessage]) -> usize {
        messages
            .iter()
            .map(|message| self.count_text(&message.render()))
            .sum()
    }
}

/// Index where the verbatim tail starts, or `None` when there is nothing
/// older than the tail. The tail never opens with a tool result, so every
/// kept result stays next to the call that produced it.
pub fn split_point(messages: &[AgentMessage], keep: usize) -> Option<usize> {
    let mut cut = messages.len().saturating_sub(keep);
    while cut > 0 && cut < messages.len() && messages[cut].is_tool_result() {
        cut -= 1;
    }
    (cut > 0).then_some(cut)
}

/// Replaces the older part of `messages` with a model-written summary once
/// the thread grows past the policy's token budget.
pub async fn maybe_summarize(
    model: &dyn ChatModel,
    counter: &TokenCounter,
    policy: &SummarizationPolicy,
    messages: Vec<AgentMessage>,
) -> Result<(Vec<AgentMessage>, bool)> {
    let tokens = counter.count(&messages);
    if tokens <= policy.max_tokens_before_summary {
        return Ok((messages, false));
    }

    let Some(cut) = split_point(&messages, policy.messages_to_keep) else {
        debug!("Thread has {} tokens but nothing to summarize", tokens);
        return Ok((messages, false));
    };

    let transcript = messages[..cut]
        .iter()
        .map(AgentMessage::render)
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = vec![
        AgentMessage::system(SUMMARY_INSTRUCTIONS),
        AgentMessage::user(transcript),
    ];
    let completion = model.complete(&prompt, &[]).await?;
    let summary = completion.text.unwrap_or_default();

    let mut condensed = Vec::with_capacity(messages.len() - cut + 1);
    condensed.push(AgentMessage::user(format!("{}\n\n{}", SUMMARY_PREFIX, summary)));
    condensed.extend(messages.into_iter().skip(cut));

    info!(
        "Summarized {} messages ({} tokens before)",
        cut, tokens
    );
    Ok((condensed, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Completion, ToolCall, ToolSchema};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct SummaryModel {
        seen: Mutex<Vec<Vec<AgentMessage>>>,
    }

    #[async_trait]
    impl ChatModel for SummaryModel {
        fn provider(&self) -> &str {
            "mock"
        }

        fn model_id(&self) -> &str {
            "mock-model"
        }

        async fn complete(
            &self,
            messages: &[AgentMessage],
            _tools: &[ToolSchema],
        ) -> Result<Completion> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(Completion {
                text: Some("customer asked about plans".to_string()),
                ..Completion::default()
            })
        }
    }

    fn conversation(turns: usize) -> Vec<AgentMessage> {
        (0..turns)
            .flat_map(|i| {
                vec![
                    AgentMessage::user(format!("question number {}", i)),
                    AgentMessage::assistant(format!("answer number {}", i)),
                ]
            })
            .collect()
    }

    fn tool_exchange() -> Vec<AgentMessage> {
        vec![
            AgentMessage::Assistant {
                content: None,
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "fetch_qa_content".to_string(),
                    arguments: serde_json::json!({"query": "plans"}),
                }],
            },
            AgentMessage::Tool {
                tool_call_id: "call_1".to_string(),
                name: "fetch_qa_content".to_string(),
                content: "{}".to_string(),
            },
        ]
    }

    #[test]
    fn test_split_point_keeps_tail() {
        let messages = conversation(3);
        assert_eq!(split_point(&messages, 2), Some(4));
        assert_eq!(split_point(&messages, 6), None);
        assert_eq!(split_point(&messages, 10), None);
    }

    #[test]
    fn test_split_point_does_not_orphan_tool_results() {
        let mut messages = conversation(1);
        messages.push(AgentMessage::user("plans?"));
        messages.extend(tool_exchange());
        messages.push(AgentMessage::assistant("here are the plans"));

        // keep=2 would start at the tool result; the cut moves back to the call.
        assert_eq!(split_point(&messages, 2), Some(3));
        assert!(matches!(messages[3], AgentMessage::Assistant { .. }));
    }

    #[tokio::test]
    async fn test_under_budget_is_untouched() {
        let model = SummaryModel {
            seen: Mutex::new(Vec::new()),
        };
        let counter = TokenCounter::new().unwrap();
        let policy = SummarizationPolicy::default();
        let messages = conversation(2);

        let (result, summarized) = maybe_summarize(&model, &counter, &policy, messages.clone())
            .await
            .unwrap();
        assert!(!summarized);
        assert_eq!(result, messages);
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_over_budget_is_condensed() {
        let model = SummaryModel {
            seen: Mutex::new(Vec::new()),
        };
        let counter = TokenCounter::new().unwrap();
        let policy = SummarizationPolicy {
            max_tokens_before_summary: 10,
            messages_to_keep: 2,
        };
        let messages = conversation(4);

        let (result, summarized) = maybe_summarize(&model, &counter, &policy, messages.clone())
            .await
            .unwrap();

        assert!(summarized);
        assert_eq!(result.len(), 3);
        match &result[0] {
            AgentMessage::User { content } => {
                assert!(content.starts_with(SUMMARY_PREFIX));
                assert!(content.contains("customer asked about plans"));
            }
            other => panic!("unexpected first message: {:?}", other),
        }
        assert_eq!(&result[1..], &messages[6..]);

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0][1].render().contains("question number 0"));
    }

    #[test]
    fn test_token_counter_counts_something() {
        let counter = TokenCounter::new().unwrap();
        assert!(counter.count_text("안녕하세요, 영진모바일입니다.") > 0);
        assert_eq!(counter.count(&[]), 0);
    }
}
