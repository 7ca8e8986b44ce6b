use anyhow::bail;
use skillsmith_llm::AnyProvider;
use skillsmith_llm::ollama::OllamaProvider;
use skillsmith_llm::openai::OpenAiProvider;

use crate::config::{Config, JudgeProviderKind};

/// Build the judge backend selected by `[judge] provider`.
///
/// # Errors
///
/// Returns an error if the selected backend is missing required settings.
pub fn create_judge_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let judge = &config.judge;
    match judge.provider {
        JudgeProviderKind::Ollama => {
            Ok(OllamaProvider::new(&judge.base_url, judge.model.clone())
                .with_temperature(judge.temperature)
                .with_max_tokens(judge.max_tokens)
                .into())
        }
        JudgeProviderKind::OpenAi => {
            if judge.base_url.trim().is_empty() {
                bail!("judge.base_url is required for the openai provider");
            }
            if config.secrets.judge_api_key.is_none() {
                tracing::warn!("SKILLSMITH_JUDGE_API_KEY is not set; sending unauthenticated requests");
            }
            Ok(OpenAiProvider::new(
                config.secrets.judge_api_key.clone(),
                judge.base_url.clone(),
                judge.model.clone(),
                judge.max_tokens,
            )
            .with_temperature(judge.temperature)
            .into())
        }
    }
}
