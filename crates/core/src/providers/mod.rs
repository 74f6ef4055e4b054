pub mod anthropic;
pub mod gemini;
pub mod openai;

use anyhow::{anyhow, Result};
use bearmobile_common::{ModelChoice, ModelProvider};
use std::sync::Arc;
use tracing::debug;

pub use anthropic::AnthropicModel;
pub use gemini::GeminiModel;
pub use openai::OpenAiModel;

use crate::model::ChatModel;

/// API keys read from the environment (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
/// `GOOGLE_API_KEY`).
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
}

impl ProviderKeys {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());
        Self {
            openai: read("OPENAI_API_KEY"),
            anthropic: read("ANTHROPIC_API_KEY"),
            google: read("GOOGLE_API_KEY"),
        }
    }
}

/// Builds a chat model client for the selected model.
pub trait ModelFactory: Send + Sync {
    fn create(&self, choice: ModelChoice) -> Result<Arc<dyn ChatModel>>;
}

pub struct ProviderFactory {
    keys: ProviderKeys,
    temperature: f32,
}

impl ProviderFactory {
    pub fn new(keys: ProviderKeys, temperature: f32) -> Self {
        Self { keys, temperature }
    }

    /// Temperature sent to models that accept one.
    fn temperature_for(&self, choice: ModelChoice) -> Option<f32> {
        choice.supports_temperature().then_some(self.temperature)
    }
}

impl ModelFactory for ProviderFactory {
    fn create(&self, choice: ModelChoice) -> Result<Arc<dyn ChatModel>> {
        debug!("Creating chat model {}", choice.model_id());
        let temperature = self.temperature_for(choice);

        let model: Arc<dyn ChatModel> = match choice.provider() {
            ModelProvider::OpenAi => Arc::new(OpenAiModel::new(
                self.keys.openai.clone(),
                choice.model_id(),
                temperature,
            )),
            ModelProvider::Anthropic => {
                let key = self
                    .keys
                    .anthropic
                    .clone()
                    .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY is not set"))?;
                Arc::new(AnthropicModel::new(key, choice.model_id(), temperature))
            }
            ModelProvider::Google => {
                let key = self
                    .keys
                    .google
                    .clone()
                    .ok_or_else(|| anyhow!("GOOGLE_API_KEY is not set"))?;
                Arc::new(GeminiModel::new(key, choice.model_id(), temperature))
            }
        };
        Ok(model)
    }
}
