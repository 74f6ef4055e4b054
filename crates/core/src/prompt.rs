use bearmobile_common::{Result, SupportError};
use std::path::Path;
use tracing::info;

pub const SYSTEM_PROMPT_PATH: &str = "./prompt/system_prompt.txt";

/// Reads the agent's system prompt. A missing or blank file is a
/// configuration error.
pub async fn load_system_prompt(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let prompt = tokio::fs::read_to_string(path).await.map_err(|e| {
        SupportError::Configuration(format!(
            "Failed to read system prompt {}: {}",
            path.display(),
            e
        ))
    })?;

    if prompt.trim().is_empty() {
        return Err(SupportError::Configuration(format!(
            "System prompt {} is empty",
            path.display()
        )));
    }

    info!("Loaded system prompt from {} ({} chars)", path.display(), prompt.chars().count());
    Ok(prompt)
}
