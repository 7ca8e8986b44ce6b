use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SKILLSMITH_SKILLS_ROOT") {
            self.skills.root = v.into();
        }
        if let Ok(v) = std::env::var("SKILLSMITH_JUDGE_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.judge.provider = kind;
            } else {
                tracing::warn!("ignoring invalid SKILLSMITH_JUDGE_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("SKILLSMITH_JUDGE_BASE_URL") {
            self.judge.base_url = v;
        }
        if let Ok(v) = std::env::var("SKILLSMITH_JUDGE_MODEL") {
            self.judge.model = v;
        }
        if let Ok(v) = std::env::var("SKILLSMITH_JUDGE_API_KEY")
            && !v.is_empty()
        {
            self.secrets.judge_api_key = Some(v);
        }
        if let Some(secs) = parse_env::<u64>("SKILLSMITH_JUDGE_TIMEOUT") {
            self.judge.timeout_secs = secs;
        }
        if let Some(mins) = parse_env::<u64>("SKILLSMITH_SESSION_IDLE_TIMEOUT") {
            self.sessions.idle_timeout_mins = mins;
        }
        if let Some(secs) = parse_env::<u64>("SKILLSMITH_SESSION_SWEEP_INTERVAL") {
            self.sessions.sweep_interval_secs = secs;
        }
        if let Some(secs) = parse_env::<u64>("SKILLSMITH_SCRIPT_TIMEOUT") {
            self.capabilities.script_timeout_secs = secs;
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.parse() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}
