use std::io::Write;
use std::path::Path;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 9] = [
    "SKILLSMITH_SKILLS_ROOT",
    "SKILLSMITH_JUDGE_PROVIDER",
    "SKILLSMITH_JUDGE_BASE_URL",
    "SKILLSMITH_JUDGE_MODEL",
    "SKILLSMITH_JUDGE_API_KEY",
    "SKILLSMITH_JUDGE_TIMEOUT",
    "SKILLSMITH_SESSION_IDLE_TIMEOUT",
    "SKILLSMITH_SESSION_SWEEP_INTERVAL",
    "SKILLSMITH_SCRIPT_TIMEOUT",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
#[serial]
fn defaults_when_file_missing() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/skillsmith.toml")).unwrap();
    assert_eq!(config.skills.root, Path::new("skills"));
    assert_eq!(config.skills.display_limit, 20);
    assert_eq!(config.judge.provider, JudgeProviderKind::Ollama);
    assert_eq!(config.judge.base_url, "http://localhost:11434");
    assert_eq!(config.judge.max_tokens, 1024);
    assert_eq!(config.judge.timeout_secs, 60);
    assert_eq!(config.sessions.idle_timeout_mins, 30);
    assert_eq!(config.sessions.sweep_interval_secs, 300);
    assert_eq!(config.capabilities.script_timeout_secs, 30);
    assert!(config.secrets.judge_api_key.is_none());
    assert_eq!(config.idle_timeout(), chrono::Duration::minutes(30));
}

#[test]
#[serial]
fn parses_partial_toml() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[skills]
root = "/srv/skills"

[judge]
provider = "openai"
base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
model = "qwen-plus"
temperature = 0.2
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.skills.root, Path::new("/srv/skills"));
    assert_eq!(config.skills.display_limit, 20);
    assert_eq!(config.judge.provider, JudgeProviderKind::OpenAi);
    assert_eq!(config.judge.model, "qwen-plus");
    assert!((config.judge.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.judge.timeout_secs, 60);
}

#[test]
#[serial]
fn unparsable_file_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[judge\nmodel = ").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_apply() {
    clear_env();
    unsafe {
        std::env::set_var("SKILLSMITH_SKILLS_ROOT", "/tmp/skills");
        std::env::set_var("SKILLSMITH_JUDGE_PROVIDER", "openai");
        std::env::set_var("SKILLSMITH_JUDGE_MODEL", "qwen-max");
        std::env::set_var("SKILLSMITH_JUDGE_API_KEY", "sk-test");
        std::env::set_var("SKILLSMITH_JUDGE_TIMEOUT", "15");
        std::env::set_var("SKILLSMITH_SESSION_IDLE_TIMEOUT", "5");
        std::env::set_var("SKILLSMITH_SCRIPT_TIMEOUT", "3");
    }
    let config = Config::load(Path::new("/nonexistent/skillsmith.toml")).unwrap();
    clear_env();

    assert_eq!(config.skills.root, Path::new("/tmp/skills"));
    assert_eq!(config.judge.provider, JudgeProviderKind::OpenAi);
    assert_eq!(config.judge.model, "qwen-max");
    assert_eq!(config.secrets.judge_api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.judge_timeout().as_secs(), 15);
    assert_eq!(config.sessions.idle_timeout_mins, 5);
    assert_eq!(config.script_timeout().as_secs(), 3);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("SKILLSMITH_JUDGE_PROVIDER", "claude");
        std::env::set_var("SKILLSMITH_JUDGE_TIMEOUT", "soon");
        std::env::set_var("SKILLSMITH_SESSION_SWEEP_INTERVAL", "-4");
    }
    let config = Config::load(Path::new("/nonexistent/skillsmith.toml")).unwrap();
    clear_env();

    assert_eq!(config.judge.provider, JudgeProviderKind::Ollama);
    assert_eq!(config.judge.timeout_secs, 60);
    assert_eq!(config.sessions.sweep_interval_secs, 300);
}

#[test]
#[serial]
fn api_key_is_never_serialized() {
    clear_env();
    let mut config = Config::default();
    config.secrets.judge_api_key = Some("sk-secret".into());
    let rendered = toml::to_string(&config).unwrap();
    assert!(!rendered.contains("sk-secret"));
}

#[test]
fn validate_rejects_zero_and_empty_values() {
    let mut config = Config::default();
    config.judge.timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.judge.model = "  ".into();
    assert!(
        config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("judge.model")
    );

    let mut config = Config::default();
    config.sessions.sweep_interval_secs = 0;
    assert!(config.validate().is_err());

    assert!(Config::default().validate().is_ok());
}
