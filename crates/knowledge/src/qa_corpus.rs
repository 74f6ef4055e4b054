use anyhow::{Context, Result};
use bearmobile_common::QaEntry;
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::embedding::Embedder;
use crate::vector_store::VectorStore;

pub const QA_CSV_PATH: &str = "./data/bearmobile_QA.csv";
pub const QA_INDEX_PATH: &str = "./vectorstore/qa_vectorstore";
pub const DEFAULT_BATCH_SIZE: usize = 100;

const REQUIRED_COLUMNS: [&str; 2] = ["question", "answer"];

/// Parses `question,answer` rows. Extra columns are ignored.
pub fn read_qa_entries<R: Read>(reader: R) -> Result<Vec<QaEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            anyhow::bail!("QA corpus is missing the '{}' column", column);
        }
    }

    let mut entries = Vec::new();
    for (row, record) in csv_reader.deserialize::<QaEntry>().enumerate() {
        // +2: header line and 1-based numbering
        let entry = record.with_context(|| format!("Malformed QA row at line {}", row + 2))?;
        entries.push(entry);
    }

    Ok(entries)
}

pub fn load_qa_csv(path: impl AsRef<Path>) -> Result<Vec<QaEntry>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open QA corpus {}", path.display()))?;
    let entries = read_qa_entries(file)?;
    info!("Read {} QA rows from {}", entries.len(), path.display());
    Ok(entries)
}

/// Embeds one blob per entry and returns the populated index.
pub async fn build_qa_index(
    entries: &[QaEntry],
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<VectorStore> {
    let texts: Vec<String> = entries.iter().map(QaEntry::to_index_text).collect();
    let metadatas: Vec<Map<String, Value>> = entries
        .iter()
        .enumerate()
        .map(|(row, entry)| {
            let mut metadata = Map::new();
            metadata.insert("row".to_string(), Value::from(row));
            metadata.insert("question".to_string(), Value::String(entry.question.clone()));
            metadata.insert("answer".to_string(), Value::String(entry.answer.clone()));
            metadata
        })
        .collect();

    let store = VectorStore::from_texts(texts, metadatas, embedder, batch_size).await?;
    info!("Built QA index with {} entries", store.len());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    const SAMPLE: &str = "question,answer\n\
        법인 명의로 계약이 가능한가요?,네 가능합니다.\n\
        \"해지는 어떻게 하나요?\",\"고객센터로 연락해 주세요, 바로 처리됩니다.\"\n\
        Is eSIM supported?,Yes on most devices.\n";

    #[test]
    fn test_read_qa_entries() {
        let entries = read_qa_entries(SAMPLE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].question, "법인 명의로 계약이 가능한가요?");
        assert_eq!(entries[1].answer, "고객센터로 연락해 주세요, 바로 처리됩니다.");
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let csv = "id,question,answer\n1,q,a\n";
        let entries = read_qa_entries(csv.as_bytes()).unwrap();
        assert_eq!(entries, vec![QaEntry::new("q", "a")]);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let csv = "question,reply\nq,a\n";
        let err = read_qa_entries(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("answer"));
    }

    #[test]
    fn test_short_row_is_an_error() {
        let csv = "question,answer\nonly-a-question\n";
        assert!(read_qa_entries(csv.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn test_index_has_one_retrievable_entry_per_row() {
        let entries = read_qa_entries(SAMPLE.as_bytes()).unwrap();
        let embedder = HashingEmbedder::default();
        let store = build_qa_index(&entries, &embedder, 2).await.unwrap();

        assert_eq!(store.len(), entries.len());
        for entry in &entries {
            let text = entry.to_index_text();
            let hits = store.search(&embedder.embed_text(&text), 1);
            assert_eq!(hits[0].text, text);
            assert_eq!(hits[0].metadata["answer"], entry.answer.as_str());
        }
    }

    #[tokio::test]
    async fn test_load_qa_csv_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let entries = load_qa_csv(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(load_qa_csv(dir.path().join("missing.csv")).is_err());
    }
}
