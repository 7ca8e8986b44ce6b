#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("judge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("judge backend returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} is rate limiting judge requests")]
    RateLimited { provider: &'static str },

    #[error("{provider} answered with status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} returned an empty reply")]
    EmptyResponse { provider: &'static str },

    #[error("{0}")]
    Other(String),
}
