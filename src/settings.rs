use anyhow::{Context, Result};
use bearmobile_api::ApiConfig;
use bearmobile_core::{
    prompt::SYSTEM_PROMPT_PATH, tools::fetch_stores_by_prefecture::STORES_CSV_PATH, CoreConfig,
};
use bearmobile_knowledge::qa_corpus::QA_INDEX_PATH;
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "config/support";
pub const ENV_PREFIX: &str = "SUPPORT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    OpenAi,
    /// Local feature hashing, for running without network access.
    Hashing,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub system_prompt: String,
    pub qa_index: String,
    pub stores_csv: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT_PATH.to_string(),
            qa_index: QA_INDEX_PATH.to_string(),
            stores_csv: STORES_CSV_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub core: CoreConfig,
    pub paths: PathsConfig,
    pub embedding: EmbeddingBackend,
}

impl AppConfig {
    /// Built-in defaults, then the optional config file, then
    /// `SUPPORT__SECTION__KEY` environment variables.
    pub fn load(file: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", file))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bearmobile_common::ModelChoice;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let config = AppConfig::load(missing.to_str().unwrap()).unwrap();

        assert_eq!(config.paths.qa_index, QA_INDEX_PATH);
        assert_eq!(config.core.default_model, ModelChoice::Gpt5Mini);
        assert_eq!(config.core.cache.similarity_threshold, 0.95);
        assert_eq!(config.embedding, EmbeddingBackend::OpenAi);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.toml");
        std::fs::write(
            &path,
            r#"
embedding = "hashing"

[api]
port = 9090

[core]
default_model = "claude-sonnet-4-5"

[core.cache]
similarity_threshold = 0.9
max_entries = 50
"#,
        )
        .unwrap();

        let base = dir.path().join("support");
        let config = AppConfig::load(base.to_str().unwrap()).unwrap();
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.core.default_model, ModelChoice::ClaudeSonnet45);
        assert_eq!(config.core.cache.max_entries, 50);
        assert_eq!(config.core.cache.ttl_secs, None);
        assert_eq!(config.embedding, EmbeddingBackend::Hashing);
        assert_eq!(config.api.host, "0.0.0.0");
    }
}
