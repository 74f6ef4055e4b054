use anyhow::{Context, Result};
use async_trait::async_trait;
use bearmobile_knowledge::{embedding::embed_query, Embedder, VectorStore};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::tool_registry::AgentTool;

pub const DEFAULT_QA_LIMIT: usize = 3;

#[derive(Debug, Deserialize)]
struct Params {
    query: String,
}

/// Looks up FAQ entries similar to the customer's question.
pub struct FetchQaContentTool {
    index: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    limit: usize,
}

impl FetchQaContentTool {
    pub fn new(index: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            limit: DEFAULT_QA_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }
}

#[async_trait]
impl AgentTool for FetchQaContentTool {
    fn name(&self) -> &str {
        "fetch_qa_content"
    }

    fn description(&self) -> &str {
        "Searches BearMobile's frequently asked questions. Use it for any question \
         about BearMobile services, plans, contracts, devices or procedures. \
         Returns the most relevant question/answer pairs."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The customer's question or the topic to look up"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value> {
        let params: Params =
            serde_json::from_value(params).context("fetch_qa_content expects {\"query\": string}")?;

        if self.index.is_empty() {
            debug!("FAQ index is empty");
            return Ok(json!({ "results": [] }));
        }

        let embedding = embed_query(self.embedder.as_ref(), &params.query).await?;
        let results: Vec<serde_json::Value> = self
            .index
            .search(&embedding, self.limit)
            .into_iter()
            .map(|hit| json!({ "content": hit.text, "score": hit.score }))
            .collect();

        debug!("fetch_qa_content '{}' -> {} results", params.query, results.len());
        Ok(json!({ "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearmobile_common::QaEntry;
    use bearmobile_knowledge::{qa_corpus::build_qa_index, HashingEmbedder};

    async fn tool() -> FetchQaContentTool {
        let embedder = Arc::new(HashingEmbedder::default());
        let entries = vec![
            QaEntry::new("법인 명의로 계약이 가능한가요?", "네, 가능합니다."),
            QaEntry::new("eSIM을 지원하나요?", "대부분의 기기에서 지원합니다."),
            QaEntry::new("요금은 언제 청구되나요?", "매월 1일에 청구됩니다."),
            QaEntry::new("해외 로밍이 되나요?", "주요 국가에서 가능합니다."),
        ];
        let index = build_qa_index(&entries, embedder.as_ref(), 10).await.unwrap();
        FetchQaContentTool::new(Arc::new(index), embedder)
    }

    #[tokio::test]
    async fn test_returns_best_match_first() {
        let tool = tool().await;
        let result = tool
            .execute(json!({"query": "question: eSIM을 지원하나요?\nanswer: 대부분의 기기에서 지원합니다."}))
            .await
            .unwrap();

        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), DEFAULT_QA_LIMIT);
        assert!(results[0]["content"].as_str().unwrap().contains("eSIM"));
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_results() {
        let tool = FetchQaContentTool::new(
            Arc::new(VectorStore::new()),
            Arc::new(HashingEmbedder::default()),
        );
        let result = tool.execute(json!({"query": "anything"})).await.unwrap();
        assert_eq!(result["results"], json!([]));
    }

    #[tokio::test]
    async fn test_missing_query_is_an_error() {
        let tool = tool().await;
        assert!(tool.execute(json!({"q": "typo"})).await.is_err());
    }
}
