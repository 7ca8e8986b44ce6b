//! Shared `reqwest` client for HTTP judge backends.

use std::time::Duration;

/// Client used by HTTP judge backends.
///
/// The judge's own deadline is enforced per call by the caller; the request
/// timeout here only bounds a connection that never answers.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(300))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("skillsmith/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("static HTTP client configuration is valid")
}
