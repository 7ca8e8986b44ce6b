//! Scripted judge backend for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::LlmError;
use crate::provider::{LlmProvider, Message};

/// Reply used once the script runs out. Not valid judge JSON.
pub const UNSCRIPTED_REPLY: &str = "mock response";

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<String>,
    requests: Vec<Vec<Message>>,
}

/// Replays canned replies in order and records every request.
///
/// Clones share the same script and request log.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    script: Arc<Mutex<Script>>,
    fail: bool,
    delay: Duration,
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(replies: Vec<String>) -> Self {
        let script = Script {
            replies: replies.into(),
            requests: Vec::new(),
        };
        Self {
            script: Arc::new(Mutex::new(script)),
            ..Self::default()
        }
    }

    /// Every call fails with [`LlmError::Other`].
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Sleep `ms` milliseconds before answering.
    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// Every message list passed to `chat`, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.lock().requests.push(messages.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(LlmError::Other("scripted judge failure".into()));
        }
        Ok(self
            .lock()
            .replies
            .pop_front()
            .unwrap_or_else(|| UNSCRIPTED_REPLY.to_owned()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
