use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::tool_registry::AgentTool;

pub const STORES_CSV_PATH: &str = "./data/bearmobile_stores.csv";

const PREFECTURE_COLUMN: &str = "prefecture";
const NATIONWIDE: &str = "전국";

/// One store row, keyed by CSV header.
pub type StoreRecord = BTreeMap<String, String>;

pub fn read_stores<R: Read>(reader: R) -> Result<Vec<StoreRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if !headers.iter().any(|header| header == PREFECTURE_COLUMN) {
        anyhow::bail!("Store list is missing the '{}' column", PREFECTURE_COLUMN);
    }

    let mut stores = Vec::new();
    for (row, record) in csv_reader.deserialize::<StoreRecord>().enumerate() {
        let store = record.with_context(|| format!("Malformed store row at line {}", row + 2))?;
        stores.push(store);
    }
    Ok(stores)
}

pub fn load_stores_csv(path: impl AsRef<Path>) -> Result<Vec<StoreRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open store list {}", path.display()))?;
    let stores = read_stores(file)?;
    info!("Loaded {} stores from {}", stores.len(), path.display());
    Ok(stores)
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    prefecture: String,
}

/// Lists BearMobile stores in a region.
pub struct FetchStoresByPrefectureTool {
    stores: Vec<StoreRecord>,
}

impl FetchStoresByPrefectureTool {
    pub fn new(stores: Vec<StoreRecord>) -> Self {
        Self { stores }
    }

    pub fn find(&self, prefecture: &str) -> Vec<&StoreRecord> {
        let wanted = normalize(prefecture);
        if wanted.is_empty() || wanted == NATIONWIDE {
            return self.stores.iter().collect();
        }

        self.stores
            .iter()
            .filter(|store| {
                let region = store
                    .get(PREFECTURE_COLUMN)
                    .map(|value| normalize(value))
                    .unwrap_or_default();
                !region.is_empty() && (region.contains(&wanted) || wanted.contains(&region))
            })
            .collect()
    }
}

#[async_trait]
impl AgentTool for FetchStoresByPrefectureTool {
    fn name(&self) -> &str {
        "fetch_stores_by_prefecture"
    }

    fn description(&self) -> &str {
        "Lists BearMobile stores in a region (province or metropolitan city, \
         e.g. '서울', '경기도', '부산'). Pass '전국' to list every store. \
         Ask the customer for their region before calling this."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "prefecture": {
                    "type": "string",
                    "description": "Region name, or '전국' for all stores"
                }
            },
            "required": ["prefecture"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value> {
        let params: Params = serde_json::from_value(params)
            .context("fetch_stores_by_prefecture expects {\"prefecture\": string}")?;

        let stores = self.find(&params.prefecture);
        debug!(
            "fetch_stores_by_prefecture '{}' -> {} stores",
            params.prefecture,
            stores.len()
        );

        Ok(json!({
            "prefecture": params.prefecture,
            "count": stores.len(),
            "stores": stores,
        }))
    }
}
