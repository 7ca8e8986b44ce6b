use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};

const PROVIDER: &str = "ollama";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = split_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Caps generated tokens (`num_predict`).
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    #[must_use]
    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    fn options(&self) -> Option<ModelOptions> {
        if self.temperature.is_none() && self.max_tokens.is_none() {
            return None;
        }
        let mut options = ModelOptions::default();
        if let Some(temperature) = self.temperature {
            options = options.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            options = options.num_predict(i32::try_from(max_tokens).unwrap_or(i32::MAX));
        }
        Some(options)
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut request = ChatMessageRequest::new(
            self.model.clone(),
            messages.iter().map(to_ollama).collect(),
        );
        if let Some(options) = self.options() {
            request = request.options(options);
        }
        let response = self.client.send_chat_messages(request).await.map_err(|e| {
            LlmError::Other(format!("ollama model {} did not answer: {e}", self.model))
        })?;

        let content = response.message.content;
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse { provider: PROVIDER });
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

fn to_ollama(message: &Message) -> ChatMessage {
    let content = message.content.clone();
    match message.role {
        Role::System => ChatMessage::system(content),
        Role::User => ChatMessage::user(content),
        Role::Assistant => ChatMessage::assistant(content),
    }
}

const DEFAULT_PORT: u16 = 11434;

/// `ollama-rs` wants the host and port separately.
fn split_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    url.rsplit_once(':')
        .and_then(|(host, port)| Some((host.to_owned(), port.parse().ok()?)))
        .unwrap_or_else(|| (url.to_owned(), DEFAULT_PORT))
}
