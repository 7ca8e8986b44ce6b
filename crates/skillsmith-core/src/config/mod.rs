mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the
    /// resulting values fail [`Config::validate`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.judge.model.trim().is_empty() {
            bail!("judge.model must not be empty");
        }
        if self.judge.timeout_secs == 0 {
            bail!("judge.timeout_secs must be greater than zero");
        }
        if self.sessions.idle_timeout_mins == 0 {
            bail!("sessions.idle_timeout_mins must be greater than zero");
        }
        if self.sessions.sweep_interval_secs == 0 {
            bail!("sessions.sweep_interval_secs must be greater than zero");
        }
        if self.capabilities.script_timeout_secs == 0 {
            bail!("capabilities.script_timeout_secs must be greater than zero");
        }
        if self.skills.display_limit == 0 {
            bail!("skills.display_limit must be greater than zero");
        }
        Ok(())
    }
}
