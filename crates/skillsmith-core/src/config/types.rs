use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

impl Config {
    #[must_use]
    pub fn judge_timeout(&self) -> Duration {
        Duration::from_secs(self.judge.timeout_secs)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> chrono::Duration {
        i64::try_from(self.sessions.idle_timeout_mins)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.sweep_interval_secs)
    }

    #[must_use]
    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.capabilities.script_timeout_secs)
    }
}

/// Values that only ever come from the environment.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub judge_api_key: Option<String>,
}

fn default_skills_root() -> PathBuf {
    PathBuf::from("skills")
}

fn default_display_limit() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SkillsConfig {
    /// Directory holding the `internal/` and `external/` scopes.
    #[serde(default = "default_skills_root")]
    pub root: PathBuf,
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            root: default_skills_root(),
            display_limit: default_display_limit(),
        }
    }
}

/// Judge model backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

impl JudgeProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for JudgeProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "qwen2.5:7b".into()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_judge_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JudgeConfig {
    #[serde(default)]
    pub provider: JudgeProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_judge_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: JudgeProviderKind::default(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_judge_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_idle_timeout_mins() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionsConfig {
    #[serde(default = "default_idle_timeout_mins")]
    pub idle_timeout_mins: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_mins: default_idle_timeout_mins(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_script_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilitiesConfig {
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            script_timeout_secs: default_script_timeout_secs(),
        }
    }
}
