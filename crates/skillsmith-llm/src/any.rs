#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{LlmProvider, Message};

/// Judge backend selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl From<OllamaProvider> for AnyProvider {
    fn from(provider: OllamaProvider) -> Self {
        Self::Ollama(provider)
    }
}

impl From<OpenAiProvider> for AnyProvider {
    fn from(provider: OpenAiProvider) -> Self {
        Self::OpenAi(provider)
    }
}

#[cfg(feature = "mock")]
impl From<MockProvider> for AnyProvider {
    fn from(provider: MockProvider) -> Self {
        Self::Mock(provider)
    }
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        match self {
            Self::Ollama(p) => p.chat(messages).await,
            Self::OpenAi(p) => p.chat(messages).await,
            #[cfg(feature = "mock")]
            Self::Mock(p) => p.chat(messages).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Ollama(p) => p.name(),
            Self::OpenAi(p) => p.name(),
            #[cfg(feature = "mock")]
            Self::Mock(p) => p.name(),
        }
    }
}
