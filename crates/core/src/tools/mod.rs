pub mod fetch_qa_content;
pub mod fetch_stores_by_prefecture;

use bearmobile_knowledge::{Embedder, VectorStore};
use std::sync::Arc;

pub use fetch_qa_content::FetchQaContentTool;
pub use fetch_stores_by_prefecture::{FetchStoresByPrefectureTool, StoreRecord};

use crate::tool_registry::ToolRegistry;

/// Registry with the FAQ lookup and store locator tools.
pub fn support_tools(
    qa_index: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    stores: Vec<StoreRecord>,
    qa_limit: usize,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(
        FetchQaContentTool::new(qa_index, embedder).with_limit(qa_limit),
    ));
    registry.register(Box::new(FetchStoresByPrefectureTool::new(stores)));
    registry
}
